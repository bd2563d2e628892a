//! End-to-end suite for the LPC mailbox: real timer thread, threaded BMC.

#[cfg(test)]
mod native_e2e;
