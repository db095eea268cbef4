/// Module for listing remote directory contents
pub(crate) mod list;

/// Module for moving around the remote directory tree
pub(crate) mod navigate;

/// Module for sending uninterpreted commands
pub(crate) mod raw;
