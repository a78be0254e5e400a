//! End-to-end exchanges against a scripted transport.

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use ab_eip::checksum::CheckMode;
use ab_eip::df1::{decode_frame as decode_df1, encode_frame as encode_df1};
use ab_eip::encapsulation::{
    decode_cpf, send_rr_data_body, send_unit_data_body, unwrap, wrap, COMMAND_REGISTER_SESSION,
    COMMAND_SEND_RR_DATA, COMMAND_SEND_UNIT_DATA, COMMAND_UNREGISTER_SESSION,
};
use ab_eip::{
    CipDataType, CipGeneralStatus, Client, ClientConfig, Df1Client, Df1Config, EipError,
    Result, SessionState, StatusResult, TagType, Transport,
};

const SESSION: u32 = 0x0102_0304;

#[derive(Default)]
struct Scripted {
    replies: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
}

impl Transport for Scripted {
    fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.sent.push(request.to_vec());
        self.replies.pop_front().ok_or(EipError::Timeout)
    }

    fn send(&mut self, request: &[u8]) -> Result<()> {
        self.sent.push(request.to_vec());
        Ok(())
    }
}

fn register_reply() -> Vec<u8> {
    wrap(COMMAND_REGISTER_SESSION, SESSION, &[1, 0, 0, 0], None).unwrap()
}

fn rr(cip: &[u8]) -> Vec<u8> {
    wrap(COMMAND_SEND_RR_DATA, SESSION, &send_rr_data_body(cip), None).unwrap()
}

fn cip_reply(service: u8, status: u8, data: &[u8]) -> Vec<u8> {
    let mut reply = vec![service | 0x80, 0x00, status, 0x00];
    reply.extend_from_slice(data);
    reply
}

fn client_with(config: ClientConfig, replies: Vec<Vec<u8>>) -> Client<Scripted> {
    let mut transport = Scripted::default();
    transport.replies.push_back(register_reply());
    transport.replies.extend(replies);
    let mut client = Client::with_transport(transport, config);
    client.register().unwrap();
    client
}

fn client(replies: Vec<Vec<u8>>) -> Client<Scripted> {
    client_with(ClientConfig::new(Ipv4Addr::LOCALHOST), replies)
}

/// CIP request carried by the `index`-th frame sent.
fn sent_cip(client: &mut Client<Scripted>, index: usize) -> Vec<u8> {
    let frame = unwrap(&client.transport_mut().sent[index]).unwrap();
    let items = decode_cpf(&frame.body).unwrap();
    items[1].data.clone()
}

#[test]
fn scenario_a_planned_fragmented_read() {
    let mut client = client_with(
        ClientConfig::new(Ipv4Addr::LOCALHOST).with_max_fragment_size(8),
        vec![
            rr(&cip_reply(0x52, 0x06, &[0xC3, 0x00, 1, 0, 2, 0, 3, 0, 4, 0])),
            rr(&cip_reply(0x52, 0x06, &[0xC3, 0x00, 5, 0, 6, 0, 7, 0, 8, 0])),
            rr(&cip_reply(0x52, 0x00, &[0xC3, 0x00, 9, 0, 10, 0])),
        ],
    );

    let reply = client.read_tag("type=0xC3;Arr", 10).unwrap();
    assert_eq!(reply.tag_type, TagType::elementary(CipDataType::Int));
    assert_eq!(reply.data.len(), 20);
    assert!(!reply.more_data);
    let values: Vec<u16> = reply
        .data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    assert_eq!(values, (1..=10).collect::<Vec<u16>>());

    let mut offsets = Vec::new();
    for index in 1..=3 {
        let request = sent_cip(&mut client, index);
        // service, 3 path words, "Arr", element count
        assert_eq!(&request[..10], &hex::decode("52039103417272000a00").unwrap()[..]);
        offsets.push(u32::from_le_bytes([request[10], request[11], request[12], request[13]]));
    }
    assert_eq!(offsets, vec![0, 8, 16]);
}

#[test]
fn scenario_a_inconsistent_fragment_fails() {
    let mut client = client_with(
        ClientConfig::new(Ipv4Addr::LOCALHOST).with_max_fragment_size(8),
        vec![
            rr(&cip_reply(0x52, 0x06, &[0xC3, 0x00, 1, 0, 2, 0, 3, 0, 4, 0])),
            // final status on a middle fragment
            rr(&cip_reply(0x52, 0x00, &[0xC3, 0x00, 5, 0, 6, 0, 7, 0, 8, 0])),
        ],
    );

    let err = client.read_tag("type=0xC3;Arr", 10).unwrap_err();
    assert!(matches!(
        err,
        EipError::InconsistentFragmentation {
            offset: 8,
            total: 20,
            received: 8,
            more_data: false
        }
    ));
    assert_eq!(client.state(), SessionState::Ready);
}

#[test]
fn scenario_a_later_fragment_failure_aborts() {
    let mut client = client_with(
        ClientConfig::new(Ipv4Addr::LOCALHOST).with_max_fragment_size(8),
        vec![
            rr(&cip_reply(0x52, 0x06, &[0xC3, 0x00, 1, 0, 2, 0, 3, 0, 4, 0])),
            rr(&cip_reply(0x52, 0x05, &[])),
        ],
    );

    match client.read_tag("type=0xC3;Arr", 10).unwrap_err() {
        EipError::FragmentFailed { offset, total, source } => {
            assert_eq!((offset, total), (8, Some(20)));
            assert!(matches!(
                *source,
                EipError::CipStatus {
                    status: CipGeneralStatus::PathDestinationUnknown,
                    ..
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn continued_read_failure_reports_announced_size() {
    let mut client = client(vec![
        rr(&cip_reply(0x4C, 0x06, &[0xC3, 0x00, 1, 0, 2, 0, 3, 0, 4, 0])),
        rr(&cip_reply(0x52, 0x05, &[])),
    ]);

    match client.read_tag("Arr", 10).unwrap_err() {
        EipError::FragmentFailed {
            offset,
            total,
            source,
        } => {
            // ten INTs announced by the first reply
            assert_eq!((offset, total), (8, Some(20)));
            assert!(matches!(*source, EipError::CipStatus { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    let request = sent_cip(&mut client, 2);
    assert_eq!(request[0], 0x52);
    assert_eq!(&request[10..14], &[8, 0, 0, 0]);
}

#[test]
fn scenario_b_bit_write_uses_read_modify_write() {
    let mut client = client(vec![rr(&cip_reply(0x4E, 0x00, &[]))]);
    client.write_bit("Tag[5]", true).unwrap();

    let request = sent_cip(&mut client, 1);
    assert_eq!(
        request,
        hex::decode("4e049103546167002800040020000000ffffffff").unwrap()
    );
}

#[test]
fn scenario_b_bit_clear_in_second_word() {
    let mut client = client(vec![rr(&cip_reply(0x4E, 0x00, &[]))]);
    client.write_bit("Flags[33]", false).unwrap();

    let request = sent_cip(&mut client, 1);
    let tail = &request[request.len() - 10..];
    assert_eq!(tail, &[0x04, 0x00, 0, 0, 0, 0, 0xFD, 0xFF, 0xFF, 0xFF]);
    // element segment selects DINT 1
    assert_eq!(&request[10..12], &[0x28, 0x01]);
}

#[test]
fn scenario_c_continuation_read() {
    let mut client = client(vec![
        rr(&cip_reply(0x4C, 0x06, &[0xC4, 0x00, 1, 0, 0, 0])),
        rr(&cip_reply(0x52, 0x00, &[0xC4, 0x00, 2, 0, 0, 0])),
    ]);

    let reply = client.read_tag("Big", 2).unwrap();
    assert_eq!(reply.data, vec![1, 0, 0, 0, 2, 0, 0, 0]);

    assert_eq!(sent_cip(&mut client, 1)[0], 0x4C);
    let second = sent_cip(&mut client, 2);
    assert_eq!(second[0], 0x52);
    assert_eq!(&second[second.len() - 4..], &4u32.to_le_bytes());
}

#[test]
fn scenario_d_pccc_over_execute_pccc() {
    let mut payload = vec![0x07, 0x3D, 0xF3, 0x45, 0x43, 0x50, 0x21];
    payload.extend_from_slice(&[0x4F, 0x00, 0x01, 0x00, 0x2A, 0x00]);
    let mut client = client(vec![rr(&cip_reply(0x4B, 0x00, &payload))]);

    assert_eq!(client.read_pccc("N7:1", 2).unwrap(), vec![0x2A, 0x00]);

    let request = sent_cip(&mut client, 1);
    assert_eq!(&request[..13], &hex::decode("4b0220672401073df345435021").unwrap()[..]);
    assert_eq!(&request[13..], &[0x0F, 0x00, 0x01, 0x00, 0xA2, 0x02, 0x07, 0x89, 0x01, 0x00]);
}

#[test]
fn pccc_status_error_is_reported() {
    let mut payload = vec![0x07, 0x3D, 0xF3, 0x45, 0x43, 0x50, 0x21];
    payload.extend_from_slice(&[0x4F, 0xF0, 0x01, 0x00, 0x06]);
    let mut client = client(vec![rr(&cip_reply(0x4B, 0x00, &payload))]);

    let err = client.read_pccc("N7:1", 2).unwrap_err();
    match err {
        EipError::PcccStatus { status, raw } => {
            assert_eq!(status.sts(), 0xF0);
            assert_eq!(status.ext_sts(), Some(0x06));
            assert!(!raw.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn pccc_reply(tns: u16, data: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x07, 0x3D, 0xF3, 0x45, 0x43, 0x50, 0x21, 0x4F, 0x00];
    payload.extend_from_slice(&tns.to_le_bytes());
    payload.extend_from_slice(data);
    rr(&cip_reply(0x4B, 0x00, &payload))
}

#[test]
fn long_pccc_read_is_split_by_elements() {
    let values: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
    let mut client = client(vec![
        pccc_reply(1, &values[..236]),
        pccc_reply(2, &values[236..]),
    ]);

    assert_eq!(client.read_pccc("N7:0", 300).unwrap(), values);

    let first = sent_cip(&mut client, 1);
    let second = sent_cip(&mut client, 2);
    assert_eq!(hex::encode(&first[..13]), "4b0220672401073df345435021");
    assert_eq!(hex::encode(&first[13..]), "0f000100a2ec07890000");
    assert_eq!(hex::encode(&second[13..]), "0f000200a24007897600");
}

#[test]
fn long_pccc_read_stops_at_failed_chunk() {
    let mut status = vec![0x07, 0x3D, 0xF3, 0x45, 0x43, 0x50, 0x21];
    status.extend_from_slice(&[0x4F, 0x10, 0x02, 0x00]);
    let mut client = client(vec![
        pccc_reply(1, &[0u8; 236]),
        rr(&cip_reply(0x4B, 0x00, &status)),
        pccc_reply(3, &[0u8; 28]),
    ]);

    match client.read_pccc("N7:0", 500).unwrap_err() {
        EipError::FragmentFailed {
            offset,
            total,
            source,
        } => {
            assert_eq!((offset, total), (236, Some(500)));
            assert!(matches!(*source, EipError::PcccStatus { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.transport_mut().sent.len(), 3);
}

#[test]
fn read_multiple_returns_per_tag_results() {
    let first = cip_reply(0x4C, 0x00, &[0xC4, 0x00, 7, 0, 0, 0]);
    let second = cip_reply(0x4C, 0x04, &[]);
    let mut data = vec![0x02, 0x00, 0x06, 0x00];
    data.extend_from_slice(&((6 + first.len()) as u16).to_le_bytes());
    data.extend_from_slice(&first);
    data.extend_from_slice(&second);
    let mut client = client(vec![rr(&cip_reply(0x0A, 0x1E, &data))]);

    let results = client.read_multiple(&["A", "Missing"]).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0],
        StatusResult::Ok {
            payload: vec![0xC4, 0x00, 7, 0, 0, 0],
            more_data: false
        }
    );
    assert!(matches!(
        results[1],
        StatusResult::Err {
            status: CipGeneralStatus::PathSegmentError,
            ..
        }
    ));

    let request = sent_cip(&mut client, 1);
    assert_eq!(&request[..6], &[0x0A, 0x02, 0x20, 0x02, 0x24, 0x01]);
    assert_eq!(&request[6..8], &[0x02, 0x00]);
}

fn symbol(instance: u32, name: &str, symbol_type: u16) -> Vec<u8> {
    let mut bytes = instance.to_le_bytes().to_vec();
    bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
    bytes.extend_from_slice(name.as_bytes());
    bytes.extend_from_slice(&symbol_type.to_le_bytes());
    bytes.extend_from_slice(&[0; 12]);
    bytes
}

#[test]
fn enumeration_follows_continuation() {
    let mut page1 = symbol(1, "Speed", 0x00CA);
    page1.extend(symbol(5, "__Hidden", 0x00C4));
    let page2 = symbol(9, "Recipe", 0x8F01);

    let mut client = client(vec![
        rr(&cip_reply(0x55, 0x06, &page1)),
        rr(&cip_reply(0x55, 0x00, &page2)),
    ]);

    let tags = client.enumerate_tags().unwrap();
    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Speed", "Recipe"]);
    assert!(tags[1].is_struct());

    let second = sent_cip(&mut client, 2);
    assert_eq!(&second[2..8], &[0x20, 0x6B, 0x25, 0x00, 0x06, 0x00]);
}

#[test]
fn program_enumeration_prefixes_names() {
    let mut client = client(vec![rr(&cip_reply(0x55, 0x00, &symbol(3, "Step", 0x00C4)))]);

    let tags = client.enumerate_program_tags("MainProgram").unwrap();
    assert_eq!(tags[0].name, "Program:MainProgram.Step");

    let request = sent_cip(&mut client, 1);
    assert_eq!(&request[2..4], &[0x91, 19]);
    assert_eq!(&request[4..23], b"Program:MainProgram");
}

#[test]
fn struct_expansion_runs_both_round_trips() {
    let attributes = hex::decode(
        "0400 0400 0000 22000000 0500 0000 1c000000 0200 0000 0200 0100 0000 0100".replace(' ', ""),
    )
    .unwrap();
    let mut template = Vec::new();
    template.extend_from_slice(&[0x00, 0x00, 0xC4, 0x00, 0x00, 0x00, 0x00, 0x00]);
    template.extend_from_slice(&[0x00, 0x00, 0xCA, 0x00, 0x04, 0x00, 0x00, 0x00]);
    template.extend_from_slice(b"Recipe;n\0Count\0Weight\0");

    let mut client = client(vec![
        rr(&cip_reply(0x03, 0x00, &attributes)),
        rr(&cip_reply(0x4C, 0x00, &template)),
    ]);

    let mut item = ab_eip::AbTagItem::new(9, "Recipe", 0x8F01);
    client.enumerate_struct(&mut item).unwrap();

    let members: Vec<(&str, Option<u32>)> = item
        .members
        .iter()
        .map(|m| (m.name.as_str(), m.byte_offset))
        .collect();
    assert_eq!(members, vec![("Count", Some(2)), ("Weight", Some(6))]);

    let read = sent_cip(&mut client, 2);
    assert_eq!(&read[..8], &[0x4C, 0x03, 0x20, 0x6C, 0x25, 0x00, 0x01, 0x0F]);
    // length = 0x22 * 4 - 21
    assert_eq!(&read[read.len() - 2..], &115u16.to_le_bytes());
}

#[test]
fn struct_expansion_rejects_atomic_tag() {
    let mut client = client(vec![]);
    let mut item = ab_eip::AbTagItem::new(1, "Speed", 0x00CA);
    assert!(matches!(
        client.enumerate_struct(&mut item),
        Err(EipError::InvalidParameter { .. })
    ));
}

#[test]
fn large_write_is_fragmented() {
    let mut client = client_with(
        ClientConfig::new(Ipv4Addr::LOCALHOST).with_max_fragment_size(4),
        vec![
            rr(&cip_reply(0x53, 0x00, &[])),
            rr(&cip_reply(0x53, 0x00, &[])),
        ],
    );

    let data = [1u8, 0, 0, 0, 2, 0, 0, 0];
    client
        .write_tag("Vals", TagType::elementary(CipDataType::Dint), 2, &data)
        .unwrap();

    let first = sent_cip(&mut client, 1);
    let second = sent_cip(&mut client, 2);
    assert_eq!(first[0], 0x53);
    assert_eq!(&first[first.len() - 8..], &[0, 0, 0, 0, 1, 0, 0, 0]);
    assert_eq!(&second[second.len() - 8..], &[4, 0, 0, 0, 2, 0, 0, 0]);
}

#[test]
fn string_round_trip() {
    let mut value = vec![0xA0, 0x02, 0xCE, 0x0F];
    value.extend(ab_eip::utils::pack_string("Hello").unwrap());
    let mut client = client(vec![
        rr(&cip_reply(0x4D, 0x00, &[])),
        rr(&cip_reply(0x4C, 0x00, &value)),
    ]);

    client.write_string("Msg", "Hello").unwrap();
    let write = sent_cip(&mut client, 1);
    assert_eq!(&write[8..14], &[0xA0, 0x02, 0xCE, 0x0F, 0x01, 0x00]);

    assert_eq!(client.read_string("Msg").unwrap(), "Hello");
}

#[test]
fn session_lifecycle() {
    let mut client = client(vec![]);
    assert_eq!(client.state(), SessionState::Ready);
    assert!(matches!(client.register(), Err(EipError::NotReady { .. })));

    // an exhausted script times out, which drops the session
    assert!(matches!(client.read_i32("Tag"), Err(EipError::Timeout)));
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(matches!(client.read_i32("Tag"), Err(EipError::NotReady { .. })));

    client.transport_mut().replies.push_back(register_reply());
    client.register().unwrap();
    client.unregister();
    assert_eq!(client.state(), SessionState::Disconnected);

    let last = client.transport_mut().sent.last().cloned().unwrap();
    let frame = unwrap(&last).unwrap();
    assert_eq!(frame.header.command, COMMAND_UNREGISTER_SESSION);
    assert_eq!(frame.header.session_handle, SESSION);
}

#[test]
fn connected_messaging() {
    let mut open = vec![0x78, 0x56, 0x34, 0x12, 0x01, 0x00, 0x42, 0x41, 0x01, 0x00];
    open.extend_from_slice(&[0; 16]);
    let read = wrap(
        COMMAND_SEND_UNIT_DATA,
        SESSION,
        &send_unit_data_body(0x4142_0001, 1, &cip_reply(0x4C, 0x00, &[0xC4, 0x00, 5, 0, 0, 0])),
        None,
    )
    .unwrap();
    let mut client = client_with(
        ClientConfig::new(Ipv4Addr::LOCALHOST)
            .with_slot(0)
            .with_connected(true),
        vec![rr(&cip_reply(0x54, 0x00, &open)), read, rr(&cip_reply(0x4E, 0x00, &[]))],
    );

    let session = client.session().unwrap();
    assert_eq!(session.o_to_t_id, Some(0x1234_5678));

    assert_eq!(client.read_i32("Tag").unwrap(), 5);
    let frame = unwrap(&client.transport_mut().sent[2]).unwrap();
    assert_eq!(frame.header.command, COMMAND_SEND_UNIT_DATA);
    let items = decode_cpf(&frame.body).unwrap();
    assert_eq!(items[0].data, 0x1234_5678u32.to_le_bytes().to_vec());
    assert_eq!(&items[1].data[..2], &[0x01, 0x00]);

    client.unregister();
    let close = sent_cip(&mut client, 3);
    assert_eq!(close[0], 0x4E);
}

#[test]
fn connected_session_keeps_connection_route_for_slot() {
    let mut open = vec![0x78, 0x56, 0x34, 0x12, 0x01, 0x00, 0x42, 0x41, 0x01, 0x00];
    open.extend_from_slice(&[0; 16]);
    let reply = cip_reply(0x4C, 0x00, &[0xC4, 0x00, 9, 0, 0, 0]);
    let read = wrap(
        COMMAND_SEND_UNIT_DATA,
        SESSION,
        &send_unit_data_body(0x4142_0001, 1, &reply),
        None,
    )
    .unwrap();
    let mut client = client_with(
        ClientConfig::new(Ipv4Addr::LOCALHOST)
            .with_slot(0)
            .with_connected(true),
        vec![rr(&cip_reply(0x54, 0x00, &open)), read],
    );

    assert_eq!(client.read_i32("slot=3;Tag").unwrap(), 9);
    let frame = unwrap(&client.transport_mut().sent[2]).unwrap();
    assert_eq!(frame.header.command, COMMAND_SEND_UNIT_DATA);
    let items = decode_cpf(&frame.body).unwrap();
    assert_eq!(items[0].data, 0x1234_5678u32.to_le_bytes().to_vec());
    // sequence count, then the bare Read Tag without an Unconnected Send
    assert_eq!(hex::encode(&items[1].data[2..]), "4c039103546167000100");
}

fn df1_reply(data: &[u8], mode: CheckMode) -> Vec<u8> {
    let mut frame = vec![0x10, 0x06];
    frame.extend(encode_df1(None, data, mode));
    frame
}

#[test]
fn df1_client_round_trip() {
    let mut transport = Scripted::default();
    transport
        .replies
        .push_back(df1_reply(&[0x00, 0x01, 0x4F, 0x00, 0x01, 0x00, 0xE8, 0x03], CheckMode::Crc16));
    transport
        .replies
        .push_back(df1_reply(&[0x00, 0x01, 0x4F, 0x00, 0x02, 0x00], CheckMode::Crc16));

    let config = Df1Config::new(1, 0).with_check_mode(CheckMode::Crc16);
    let mut df1 = Df1Client::new(transport, config);

    assert_eq!(df1.read_words("N7:10", 1).unwrap(), vec![1000]);
    df1.write_words("N7:11", &[7]).unwrap();

    let sent = df1.into_inner().sent;
    let write = decode_df1(&sent[1], CheckMode::Crc16).unwrap();
    assert_eq!(
        write,
        vec![0x01, 0x00, 0x0F, 0x00, 0x02, 0x00, 0xAA, 0x02, 0x07, 0x89, 0x0B, 0x00, 0x07, 0x00]
    );
}

#[test]
fn df1_stale_tns_is_rejected() {
    let mut transport = Scripted::default();
    transport
        .replies
        .push_back(df1_reply(&[0x00, 0x01, 0x4F, 0x00, 0x09, 0x00], CheckMode::Bcc));
    let mut df1 = Df1Client::new(transport, Df1Config::default());

    assert!(matches!(
        df1.read("N7:0", 2),
        Err(EipError::TnsMismatch {
            expected: 1,
            received: 9
        })
    ));
}

#[cfg(feature = "serde")]
#[test]
fn configs_serialize() {
    let config = ClientConfig::new(Ipv4Addr::new(10, 0, 0, 5)).with_slot(2);
    let json = serde_json::to_string(&config).unwrap();
    let back: ClientConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.slot, Some(2));
    assert_eq!(back.plc_addr, config.plc_addr);

    let df1 = Df1Config::new(2, 0).with_check_mode(CheckMode::Crc16);
    let json = serde_json::to_string(&df1).unwrap();
    assert_eq!(serde_json::from_str::<Df1Config>(&json).unwrap(), df1);
}

#[test]
fn typed_writes_carry_type_codes() {
    let mut client = client((0..7).map(|_| rr(&cip_reply(0x4D, 0x00, &[]))).collect());
    client.write_bool("V", true).unwrap();
    client.write_i8("V", -1).unwrap();
    client.write_u16("V", 0xBEEF).unwrap();
    client.write_u32("V", 7).unwrap();
    client.write_i64("V", -2).unwrap();
    client.write_f64("V", 1.5).unwrap();
    client.write_i16("V", 300).unwrap();

    // 4D, 2 path words, 91 01 'V' 00, type, elements, value
    let expected: [(&[u8], &[u8]); 7] = [
        (&[0xC1, 0x00], &[0x01]),
        (&[0xC2, 0x00], &[0xFF]),
        (&[0xC7, 0x00], &[0xEF, 0xBE]),
        (&[0xC8, 0x00], &[7, 0, 0, 0]),
        (&[0xC5, 0x00], &(-2i64).to_le_bytes()),
        (&[0xCB, 0x00], &1.5f64.to_le_bytes()),
        (&[0xC3, 0x00], &300i16.to_le_bytes()),
    ];
    for (index, (type_code, value)) in expected.iter().enumerate() {
        let request = sent_cip(&mut client, index + 1);
        assert_eq!(&request[..6], &[0x4D, 0x02, 0x91, 0x01, b'V', 0x00]);
        assert_eq!(&request[6..8], *type_code);
        assert_eq!(&request[8..10], &[0x01, 0x00]);
        assert_eq!(&request[10..], *value);
    }
}

#[test]
fn typed_reads_decode_values() {
    let mut client = client(vec![
        rr(&cip_reply(0x4C, 0x00, &[0xC2, 0x00, 0xFE])),
        rr(&cip_reply(0x4C, 0x00, &[0xC3, 0x00, 0x18, 0xFC])),
        rr(&cip_reply(0x4C, 0x00, &[0xC7, 0x00, 0xEF, 0xBE])),
        rr(&cip_reply(0x4C, 0x00, &[0xC8, 0x00, 0x01, 0x00, 0x00, 0x80])),
        rr(&cip_reply(0x4C, 0x00, &[0xCA, 0x00, 0x00, 0x00, 0x20, 0x41])),
        rr(&cip_reply(0x4C, 0x00, &[0xC5, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])),
        rr(&cip_reply(0x4C, 0x00, &[0xCB, 0x00, 0, 0, 0, 0, 0, 0, 0xF8, 0x3F])),
        rr(&cip_reply(0x4C, 0x00, &[0xC1, 0x00, 0x01])),
    ]);

    assert_eq!(client.read_i8("A").unwrap(), -2);
    assert_eq!(client.read_i16("A").unwrap(), -1000);
    assert_eq!(client.read_u16("A").unwrap(), 0xBEEF);
    assert_eq!(client.read_u32("A").unwrap(), 0x8000_0001);
    assert_eq!(client.read_f32("A").unwrap(), 10.0);
    assert_eq!(client.read_i64("A").unwrap(), -1);
    assert_eq!(client.read_f64("A").unwrap(), 1.5);
    assert!(client.read_bool("A").unwrap());
}

#[test]
fn pccc_write_and_bit_write() {
    let ok = |tns: u16| {
        let mut payload = vec![0x07, 0x3D, 0xF3, 0x45, 0x43, 0x50, 0x21, 0x4F, 0x00];
        payload.extend_from_slice(&tns.to_le_bytes());
        rr(&cip_reply(0x4B, 0x00, &payload))
    };
    let mut client = client(vec![ok(1), ok(2)]);

    client.write_pccc("N7:3", &[0x34, 0x12]).unwrap();
    client.write_pccc_bit("B3:0/4", true).unwrap();

    let write = sent_cip(&mut client, 1);
    assert_eq!(
        &write[13..],
        &[0x0F, 0x00, 0x01, 0x00, 0xAA, 0x02, 0x07, 0x89, 0x03, 0x00, 0x34, 0x12]
    );
    let bit = sent_cip(&mut client, 2);
    assert_eq!(&bit[13..19], &[0x0F, 0x00, 0x02, 0x00, 0xAB, 0x02]);
    assert_eq!(&bit[bit.len() - 4..], &[0x10, 0x00, 0x10, 0x00]);
}

#[test]
fn df1_half_duplex_station_header() {
    let mut transport = Scripted::default();
    let mut reply = vec![0x10, 0x06];
    reply.extend(encode_df1(
        Some(4),
        &[0x00, 0x01, 0x4F, 0x00, 0x01, 0x00, 0x05, 0x00],
        CheckMode::Bcc,
    ));
    transport.replies.push_back(reply);

    let mut df1 = Df1Client::new(transport, Df1Config::new(1, 0).with_station(4));
    assert_eq!(df1.read_words("N7:0", 1).unwrap(), vec![5]);

    let sent = &df1.transport_mut().sent[0];
    assert_eq!(&sent[..5], &[0x10, 0x01, 0x04, 0x10, 0x02]);
}

#[test]
fn injected_strategy_is_used() {
    use ab_eip::strategy::{ProtocolStrategy, ServiceCodec};

    /// Always asks for two elements.
    struct Pairs;

    impl ServiceCodec for Pairs {
        fn read_tag(&self, path: &[u8], _elements: u16) -> Result<Vec<u8>> {
            Ok(ab_eip::service::ReadTagRequest::new(path, 2)?.to_bytes())
        }
    }

    let mut transport = Scripted::default();
    transport.replies.push_back(register_reply());
    transport
        .replies
        .push_back(rr(&cip_reply(0x4C, 0x00, &[0xC4, 0x00, 1, 0, 0, 0, 2, 0, 0, 0])));
    let mut client = Client::with_transport(transport, ClientConfig::new(Ipv4Addr::LOCALHOST))
        .with_strategy(ProtocolStrategy::default().with_service_codec(Pairs));
    client.register().unwrap();

    assert_eq!(client.read_tag("T", 1).unwrap().data.len(), 8);
    let request = sent_cip(&mut client, 1);
    assert_eq!(&request[request.len() - 2..], &[0x02, 0x00]);
}
