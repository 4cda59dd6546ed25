use proptest::prelude::*;
use std::net::Ipv4Addr;

use leased::{
    v4::{
        self,
        packet::{MAGIC_COOKIE, MAX_PACKET_LEN, MIN_PACKET_LEN},
        Header, OptionSet,
    },
    Engine, EngineConfig, InterfaceDescriptor,
};

fn valid_header() -> Vec<u8> {
    let mut packet = vec![0u8; MIN_PACKET_LEN];
    packet[0] = 2;
    packet[1] = 1;
    packet[2] = 6;
    packet[236..240].copy_from_slice(&MAGIC_COOKIE);
    packet
}

fn arb_header() -> impl Strategy<Value = Header> {
    (
        (any::<u8>(), any::<u8>(), 0u8..=16, any::<u8>()),
        (any::<u32>(), any::<u16>(), any::<u16>()),
        (any::<u32>(), any::<u32>(), any::<u32>(), any::<u32>()),
        any::<[u8; 16]>(),
        prop::collection::vec(any::<u8>(), 64),
        prop::collection::vec(any::<u8>(), 128),
    )
        .prop_map(
            |((op, htype, hlen, hops), (xid, secs, flags), (ci, yi, si, gi), chaddr, sname, file)| {
                let mut header = Header {
                    op,
                    htype,
                    hlen,
                    hops,
                    xid,
                    secs,
                    flags,
                    ciaddr: Ipv4Addr::from(ci),
                    yiaddr: Ipv4Addr::from(yi),
                    siaddr: Ipv4Addr::from(si),
                    giaddr: Ipv4Addr::from(gi),
                    chaddr,
                    ..Header::default()
                };
                header.sname.copy_from_slice(&sname);
                header.file.copy_from_slice(&file);
                header
            },
        )
}

/// Option sets that fit the option area: tags avoid Pad and End.
fn arb_options() -> impl Strategy<Value = OptionSet> {
    prop::collection::vec((1u8..255, prop::collection::vec(any::<u8>(), 0..40)), 0..7).prop_map(
        |entries| {
            let mut set = OptionSet::new();
            for (tag, value) in entries {
                set.insert_raw(tag, value);
            }
            set
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    #[test]
    fn decode_never_panics_on_arbitrary_bytes(data: Vec<u8>) {
        let _ = v4::decode(&data);
    }

    #[test]
    fn option_parse_never_panics(options_data in prop::collection::vec(any::<u8>(), 0..400)) {
        let mut packet = valid_header();
        packet.extend_from_slice(&options_data);
        if let Ok(decoded) = v4::decode(&packet) {
            let _ = decoded.parse_options();
        }
    }

    #[test]
    fn decode_enforces_size_bounds(len in 0usize..800) {
        let mut packet = vec![0u8; len];
        if len >= MIN_PACKET_LEN {
            packet[236..240].copy_from_slice(&MAGIC_COOKIE);
        }
        let accepted = v4::decode(&packet).is_ok();
        prop_assert_eq!(accepted, (MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&len));
    }

    #[test]
    fn encode_then_decode_preserves_packet(header in arb_header(), options in arb_options()) {
        match v4::encode(&header, &options) {
            Ok(bytes) => {
                prop_assert!(bytes.len() <= MAX_PACKET_LEN);
                let packet = v4::decode(&bytes).unwrap();
                prop_assert_eq!(&packet.header, &header);
                prop_assert_eq!(packet.parse_options(), options);
            }
            Err(v4::CodecError::OptionsTooLarge { len, max }) => prop_assert!(len > max),
            Err(e) => prop_assert!(false, "unexpected error {}", e),
        }
    }

    #[test]
    fn engine_survives_arbitrary_datagrams(data in prop::collection::vec(any::<u8>(), 0..600)) {
        let mut engine = Engine::new(EngineConfig::default());
        engine.start(vec![InterfaceDescriptor::new("eth0", [2, 0, 0, 0, 0, 1])]);
        let _ = engine.on_datagram(&data);
        prop_assert!(engine.transactions().len() <= 1);
    }
}
