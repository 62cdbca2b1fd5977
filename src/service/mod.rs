//! Statement execution used by the selection builder and dispatch.

pub mod crud;
