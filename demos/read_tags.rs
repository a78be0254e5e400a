//! Example: Reading and writing Logix tags
//!
//! Run with: cargo run --example read_tags
//!
//! This example demonstrates:
//! - Registering a session routed to a processor in slot 0
//! - Typed reads and writes (DINT, REAL, BOOL, STRING)
//! - Bit writes with Read-Modify-Write
//! - Large array reads split into fragments
//! - Reading several tags in one Multiple Service Packet
//! - Listing controller tags and expanding a structure

use ab_eip::utils::{format_hex, unpack_bools};
use ab_eip::{Client, ClientConfig, EipError, StatusResult};
use std::net::Ipv4Addr;
use std::time::Duration;

fn main() -> ab_eip::Result<()> {
    // =========================================================================
    // Connect to PLC
    // =========================================================================

    let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 10))
        .with_slot(0)
        .with_timeout(Duration::from_secs(2));
    let mut client = Client::connect(config)?;
    println!(
        "Session 0x{:08X} registered",
        client.session().map_or(0, |s| s.session_handle)
    );

    // =========================================================================
    // Typed Reads
    // =========================================================================

    println!("\n=== Typed Reads ===\n");

    let count = client.read_i32("PartCount")?;
    println!("PartCount = {count} ({})", format_hex(count as u32));

    let speed = client.read_f32("Program:MainProgram.LineSpeed")?;
    println!("LineSpeed = {speed:.2}");

    let running = client.read_bool("Running")?;
    println!("Running   = {running}");

    let recipe = client.read_string("RecipeName")?;
    println!("Recipe    = {recipe:?}");

    // =========================================================================
    // Writes
    // =========================================================================

    println!("\n=== Writes ===\n");

    client.write_i32("PartCount", count + 1)?;
    client.write_f32("Program:MainProgram.LineSpeed", 42.5)?;
    client.write_string("RecipeName", "Batch-7")?;
    println!("PartCount, LineSpeed and RecipeName updated");

    // Flags is a BOOL[64]; only bit 37 changes
    client.write_bit("Flags[37]", true)?;
    let reply = client.read_tag("Flags", 2)?;
    let bits = unpack_bools(&reply.data);
    println!("Flags[37] = {}", bits[37]);

    // =========================================================================
    // Large Arrays
    // =========================================================================

    println!("\n=== Large Arrays ===\n");

    // 1000 DINTs, read as 480-byte fragments because the type is announced
    let trend = client.read_tag("type=0xC4;Trend", 1000)?;
    let first: Vec<i32> = trend
        .data
        .chunks_exact(4)
        .take(5)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    println!("Trend: {} bytes, first values {first:?}", trend.data.len());

    // =========================================================================
    // Multiple Service Packet
    // =========================================================================

    println!("\n=== Multiple Tags ===\n");

    let names = ["PartCount", "Running", "DoesNotExist"];
    for (name, result) in names.iter().zip(client.read_multiple(&names)?) {
        match result {
            StatusResult::Ok { payload, .. } => println!("{name:<14} {payload:02X?}"),
            StatusResult::Err { status, .. } => println!("{name:<14} failed: {status}"),
        }
    }

    // =========================================================================
    // Tag Listing
    // =========================================================================

    println!("\n=== Controller Tags ===\n");

    for mut tag in client.enumerate_tags()? {
        if tag.is_struct() {
            match client.enumerate_struct(&mut tag) {
                Ok(()) => {}
                Err(EipError::CipStatus { status, .. }) => {
                    println!("{:<24} template unavailable: {status}", tag.name);
                    continue;
                }
                Err(e) => return Err(e),
            }
            println!("{:<24} struct", tag.name);
            for member in &tag.members {
                println!(
                    "    +{:<4} {:<20} 0x{:04X}",
                    member.byte_offset.unwrap_or_default(),
                    member.name,
                    member.type_code()
                );
            }
        } else {
            let type_name = tag
                .data_type()
                .map_or_else(|| format!("0x{:04X}", tag.type_code()), |t| t.to_string());
            println!("{:<24} {type_name}", tag.name);
        }
    }

    client.close();
    Ok(())
}
