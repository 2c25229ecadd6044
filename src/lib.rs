// SPDX-License-Identifier: MIT

//! Device selection expressions
//!
//! [`selector`] compiles boolean expressions over a device's driver,
//! attributes and capacities and evaluates them against concrete devices,
//! with a bounded cost. [`expr`] is the expression language underneath.

pub mod expr;
pub mod selector;
