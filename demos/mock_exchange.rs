/// Mock ABX exchange server
///
/// Generates a random trade flow and serves it over TCP using the ABX wire
/// protocol. A share of packets is left out of every stream-all response and
/// only served on resend, so clients have gaps to repair.
///
/// Usage: mock_exchange [port] [packet_count] [drop_percent]
///
/// Like the real exchange, the server closes the connection after a
/// stream-all response. Run the client with `--reconnect-for-repairs`.

use std::collections::BTreeSet;
use std::env;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use abx_client::protocol::REQUEST_SIZE;
use abx_client::{Packet, Request};
use rand::Rng;

const SYMBOLS: [&str; 4] = ["AAPL", "MSFT", "AMZN", "META"];

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();

    let port: u16 = if args.len() > 1 {
        args[1].parse().unwrap_or(3000)
    } else {
        3000
    };

    let packet_count: i32 = if args.len() > 2 {
        args[2].parse().unwrap_or(14)
    } else {
        14
    };

    let drop_percent: u32 = if args.len() > 3 {
        args[3].parse().unwrap_or(20)
    } else {
        20
    };

    let mut rng = rand::thread_rng();
    let mut packets = Vec::with_capacity(packet_count.max(0) as usize);
    for sequence in 1..=packet_count {
        packets.push(Packet {
            symbol: SYMBOLS[rng.gen_range(0..SYMBOLS.len())].to_string(),
            side: if rng.gen_bool(0.5) { 'B' } else { 'S' },
            quantity: rng.gen_range(1..=500),
            price: rng.gen_range(50..=150),
            sequence,
        });
    }

    // Never drop the first or last packet so the gaps sit inside the span.
    let dropped: BTreeSet<i32> = (2..packet_count)
        .filter(|_| rng.gen_range(0..100) < drop_percent)
        .collect();

    println!(
        "Serving {} packets on port {} ({} held back: {:?})",
        packet_count,
        port,
        dropped.len(),
        dropped
    );

    let listener = TcpListener::bind(("0.0.0.0", port))?;
    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                if let Err(e) = serve(stream, &packets, &dropped) {
                    println!("Connection error: {}", e);
                }
            }
            Err(e) => println!("Accept failed: {}", e),
        }
    }

    Ok(())
}

fn serve(mut stream: TcpStream, packets: &[Packet], dropped: &BTreeSet<i32>) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    println!("Client connected: {}", peer);

    loop {
        let mut frame = [0u8; REQUEST_SIZE];
        if stream.read_exact(&mut frame).is_err() {
            println!("Client disconnected: {}", peer);
            return Ok(());
        }

        match Request::parse(&frame) {
            Ok(Request::StreamAll) => {
                let mut sent = 0;
                for packet in packets.iter().filter(|p| !dropped.contains(&p.sequence)) {
                    stream.write_all(&packet.encode())?;
                    sent += 1;
                }
                println!("Streamed {} packets to {}, closing", sent, peer);
                return Ok(());
            }
            Ok(Request::Resend(seq)) => {
                match packets.iter().find(|p| p.sequence == i32::from(seq)) {
                    Some(packet) => {
                        stream.write_all(&packet.encode())?;
                        println!("Resent packet {} to {}", seq, peer);
                    }
                    None => {
                        println!("Unknown sequence {} requested, closing", seq);
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                println!("Bad request from {}: {}", peer, e);
                return Ok(());
            }
        }
    }
}
