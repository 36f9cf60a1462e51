// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

mod clock;
mod irq_control;
mod irq_line;
mod shared;
mod timer;

pub use self::clock::{VirtualClock, NANOS_PER_MILLI, NANOS_PER_SEC};
pub use self::irq_control::IrqControl;
pub use self::irq_line::IrqLine;
pub use self::shared::{new_shared, new_shared_cell, Shared, SharedCell, WeakShared};
pub use self::timer::{next_grid_deadline, Timer};
