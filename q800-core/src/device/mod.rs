// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

pub mod adb;
mod adb_keyboard;
mod adb_mouse;

pub use self::adb::Adb;
pub use self::adb_keyboard::AdbKeyboard;
pub use self::adb_mouse::AdbMouse;
