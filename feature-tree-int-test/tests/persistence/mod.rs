//! Index files written to and read back from disk.
