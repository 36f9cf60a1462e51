// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub type Shared<T> = Rc<RefCell<T>>;
pub type SharedCell<T> = Rc<Cell<T>>;
/// Non-owning handle used by input lines that point back at their owner.
pub type WeakShared<T> = Weak<RefCell<T>>;

pub fn new_shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

pub fn new_shared_cell<T>(value: T) -> SharedCell<T> {
    Rc::new(Cell::new(value))
}
