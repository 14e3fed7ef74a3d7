// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use nix::unistd::getpid;
use once_cell::sync::OnceCell;

static PROCESS_ID: OnceCell<i32> = OnceCell::new();

/// Returns the id of the calling process.  Buffer handles record it as their owner.
///
/// The value is computed on first use; concurrent first calls agree on a single value.
pub fn process_id() -> i32 {
    *PROCESS_ID.get_or_init(|| getpid().as_raw())
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn stable_across_threads() {
        let ids: Vec<i32> = (0..4)
            .map(|_| thread::spawn(process_id))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();

        assert!(ids.iter().all(|id| *id == std::process::id() as i32));
        assert_ne!(process_id(), 0);
    }
}
