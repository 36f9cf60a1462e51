// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

mod types;

pub use self::types::{Addressable, AdbBus, AdbDevice, Chip};
