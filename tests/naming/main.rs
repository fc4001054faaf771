mod common;
mod lifecycle;
mod locking;
mod namespace;
mod registration;
