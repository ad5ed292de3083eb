// SPDX-License-Identifier: GPL-3.0-or-later

pub mod args;
pub mod config;
pub mod context;
pub mod database;
pub mod environment;
pub mod event;
pub mod output;
pub mod semantic;
pub mod session;
