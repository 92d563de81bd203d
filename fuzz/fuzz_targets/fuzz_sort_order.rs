// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![no_main]

use arbitrary::Arbitrary;
use bundle_importer::graph::sort_records;
use bundle_importer::types::{Method, Record};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

#[derive(Arbitrary, Debug)]
struct Step {
    id: u8,
    requires: Vec<u8>,
}

fuzz_target!(|steps: Vec<Step>| {
    let records: Vec<Record> = steps
        .iter()
        .map(|step| {
            Record::new(format!("addMachines-{}", step.id), Method::AddMachines)
                .requiring(step.requires.iter().map(|r| format!("addMachines-{r}")))
        })
        .collect();
    let Ok(sorted) = sort_records(records) else {
        return;
    };
    assert_eq!(sorted.len(), steps.len());

    let position: HashMap<&str, usize> = sorted
        .iter()
        .enumerate()
        .map(|(at, record)| (record.id.as_str(), at))
        .collect();
    for record in &sorted {
        for required in &record.requires {
            assert!(position[required.as_str()] < position[record.id.as_str()]);
        }
    }
});
