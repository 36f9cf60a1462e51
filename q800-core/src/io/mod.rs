// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

pub mod mos6522;
pub mod rtc;
pub mod via1;
pub mod via2;
pub mod via_timer;
