// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![no_main]

use bundle_importer::graph::sort_records;
use bundle_importer::types::Record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(records) = serde_json::from_slice::<Vec<Record>>(data) else {
        return;
    };
    let count = records.len();
    if let Ok(sorted) = sort_records(records) {
        assert_eq!(sorted.len(), count);
    }
});
