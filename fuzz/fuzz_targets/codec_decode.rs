//! Fuzz target for payload decoding.
//!
//! Payloads come from a shared store and may be truncated or written by a
//! different codec; decoding them must fail cleanly, never panic.

#![no_main]

use arbitrary::Arbitrary;
use flightcache_codec::{Codec, Compactor, Serializer};
use libfuzzer_sys::fuzz_target;
use serde::{Deserialize, Serialize};

#[derive(Debug, Arbitrary)]
struct FuzzPayload {
    serializer: u8,
    compactor: u8,
    data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    id: u64,
    name: String,
    scores: Vec<f64>,
}

fn codec(input: &FuzzPayload) -> Codec {
    let serializer = match input.serializer % 3 {
        0 => Serializer::Json,
        1 => Serializer::Yaml,
        _ => Serializer::Bincode,
    };
    let compactor = match input.compactor % 4 {
        0 => Compactor::Raw,
        1 => Compactor::Gzip,
        2 => Compactor::Brotli,
        _ => Compactor::Zstd,
    };
    Codec::new(serializer, compactor)
}

fuzz_target!(|input: FuzzPayload| {
    let codec = codec(&input);

    let _ = codec.decode::<Record>(&input.data);
    let _ = codec.decode::<String>(&input.data);
    let _ = codec.decode::<Vec<u32>>(&input.data);
});
