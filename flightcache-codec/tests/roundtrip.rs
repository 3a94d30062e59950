//! Property tests: the codec pipeline is lossless for every stage pairing.

use flightcache_codec::{Codec, Compactor, Serializer};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u64,
    customer: String,
    lines: Vec<(String, u32)>,
    note: Option<String>,
}

fn serializers() -> Vec<Serializer> {
    let mut all = vec![Serializer::Json];
    #[cfg(feature = "yaml")]
    all.push(Serializer::Yaml);
    #[cfg(feature = "bincode")]
    all.push(Serializer::Bincode);
    all
}

fn compactors() -> Vec<Compactor> {
    let mut all = vec![Compactor::Raw];
    #[cfg(feature = "gzip")]
    all.push(Compactor::Gzip);
    #[cfg(feature = "brotli")]
    all.push(Compactor::Brotli);
    #[cfg(feature = "zstd")]
    all.push(Compactor::Zstd);
    all
}

fn order_strategy() -> impl Strategy<Value = Order> {
    (
        any::<u64>(),
        "[a-z]{0,16}",
        prop::collection::vec(("[a-z0-9]{1,8}", any::<u32>()), 0..8),
        prop::option::of("[a-zA-Z0-9 ,.]{0,32}"),
    )
        .prop_map(|(id, customer, lines, note)| Order {
            id,
            customer,
            lines,
            note,
        })
}

proptest! {
    #[test]
    fn codec_is_lossless(order in order_strategy()) {
        for serializer in serializers() {
            for compactor in compactors() {
                let codec = Codec::new(serializer, compactor);
                let bytes = codec.encode(&order).unwrap();
                prop_assert!(!bytes.is_empty());
                let back: Order = codec.decode(&bytes).unwrap();
                prop_assert_eq!(&back, &order);
            }
        }
    }
}
