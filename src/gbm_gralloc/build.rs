// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::env;

fn main() -> Result<(), pkg_config::Error> {
    // Skip installing dependencies when generating documents.
    if env::var("CARGO_DOC").is_ok() {
        return Ok(());
    }

    if env::var("CARGO_FEATURE_MINIGBM").is_ok() {
        pkg_config::Config::new().probe("gbm")?;
        pkg_config::Config::new().probe("libdrm")?;
    }

    Ok(())
}
