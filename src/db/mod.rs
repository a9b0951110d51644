// SPDX-License-Identifier: MIT

//! Database layer.

mod store;

pub use store::Db;
