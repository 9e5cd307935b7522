//! Bridge demo with synthetic drivers
//!
//! Run with: cargo run --example simple_bridge
//!
//! Wires the bridge against an in-process RTSP driver that synthesizes an
//! H.264-shaped packet stream (25 fps, keyframe every 2 s) and a muxer that
//! logs what a WebRTC peer would receive. Real deployments plug an actual
//! RTSP client binding and WebRTC stack into the same two traits.
//!
//! Try it:
//!   curl -s -X POST localhost:8083/api/streams \
//!     -H 'content-type: application/json' \
//!     -d '{"name":"demo","url":"rtsp://demo/cam1"}'
//!   curl -s localhost:8083/stream/codec/rtsp:%2F%2Fdemo%2Fcam1
//!   curl -s localhost:8083/api/streams

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use rtsp_bridge::config::CONFIG_FILE;
use rtsp_bridge::{
    AppConfig, Args, Bridge, CodecInfo, Muxer, MuxerError, MuxerFactory, MuxerOptions, Packet,
    RtspDialer, RtspOptions, RtspSession, StreamError,
};

/// Driver that synthesizes media instead of dialing a camera
struct SyntheticDialer;

#[async_trait]
impl RtspDialer for SyntheticDialer {
    async fn dial(&self, opts: RtspOptions) -> Result<RtspSession, StreamError> {
        println!("synthetic dial: {}", opts.url);

        let (signal_tx, signal_rx) = mpsc::channel(16);
        let (packet_tx, packet_rx) = mpsc::channel(256);

        // Feed 25 fps with a keyframe every 50th frame until the session
        // handle is dropped.
        tokio::spawn(async move {
            // Keep the control channel open while feeding; closing it would
            // read as an RTSP disconnect.
            let _signal_tx = signal_tx;
            let mut frame: u64 = 0;
            let mut ticker = tokio::time::interval(Duration::from_millis(40));
            loop {
                ticker.tick().await;
                let pkt = Packet::video(
                    0,
                    Duration::from_millis(frame * 40),
                    Bytes::from_static(&[0x65, 0x88, 0x84, 0x00]),
                    frame % 50 == 0,
                );
                if packet_tx.send(pkt).await.is_err() {
                    break;
                }
                frame += 1;
            }
        });

        Ok(RtspSession {
            codecs: Some(vec![CodecInfo::H264 {
                sps: Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F]),
                pps: Bytes::from_static(&[0x68, 0xEF, 0x38]),
            }]),
            signals: signal_rx,
            packets: packet_rx,
        })
    }
}

/// Muxer that reports instead of speaking WebRTC
struct LoggingMuxer {
    packets: u64,
}

#[async_trait]
impl Muxer for LoggingMuxer {
    async fn write_header(
        &mut self,
        codecs: &[CodecInfo],
        sdp_offer: &str,
    ) -> Result<String, MuxerError> {
        println!(
            "write_header: {} tracks, offer {} bytes",
            codecs.len(),
            sdp_offer.len()
        );
        Ok("v=0\r\ns=synthetic answer\r\n".to_string())
    }

    async fn write_packet(&mut self, pkt: &Packet) -> Result<(), MuxerError> {
        self.packets += 1;
        if pkt.is_key_frame {
            println!("write_packet: keyframe at {:?} ({} total)", pkt.time, self.packets);
        }
        Ok(())
    }

    async fn close(&mut self) {
        println!("muxer closed after {} packets", self.packets);
    }
}

struct LoggingMuxerFactory;

impl MuxerFactory for LoggingMuxerFactory {
    fn create(&self, opts: MuxerOptions) -> Box<dyn Muxer> {
        println!(
            "muxer created: {} ice servers, ports {}-{}",
            opts.ice_servers.len(),
            opts.port_min,
            opts.port_max
        );
        Box::new(LoggingMuxer { packets: 0 })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtsp_bridge=debug".parse()?),
        )
        .init();

    let config_path = std::path::Path::new(CONFIG_FILE);
    let config = match AppConfig::load(config_path)? {
        Some(config) => config,
        None => {
            use clap::Parser;
            println!("{CONFIG_FILE} not found, using CLI defaults");
            Args::parse().into_config()
        }
    };

    let bridge = Bridge::new(
        config,
        config_path,
        Arc::new(SyntheticDialer),
        Arc::new(LoggingMuxerFactory),
    );

    println!("listening on {}", bridge.config.server.listen_addr());

    // Run with Ctrl+C handling
    tokio::select! {
        result = bridge.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
