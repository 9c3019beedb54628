//! Inspects and adjusts a sound server from plain blocking calls.
//!
//! Runs against the in-process fake server, so no sound server needs to be running.
//!
//! Run with: `cargo run --example sound_bridge_basic`.

use sound_bridge::fake::FakeServer;
use sound_bridge::info::{ChannelVolumes, Volume};
use sound_bridge::{Context, EventLoop};

fn main() -> sound_bridge::Result<()> {
    let event_loop = EventLoop::builder()
        .thread_name("sound-loop")
        .build();

    let server = FakeServer::builder()
        .server_name("demo-server")
        .sink("speakers")
        .sink("headphones")
        .source("microphone")
        .card("built-in-audio")
        .sink_input("music")
        .build();

    let context = Context::builder(&event_loop, server)
        .name("sound-bridge-demo")
        .build();

    context.connect(None)?;

    let info = context.server_info()?;
    println!(
        "Connected to {} {} on {}",
        info.server_name, info.server_version, info.host_name
    );
    println!(
        "Default sink: {}, default source: {}",
        info.default_sink_name, info.default_source_name
    );
    println!();

    println!("Sinks:");
    for sink in context.sink_info_list()? {
        println!(
            "  #{} {} ({} channels, muted: {})",
            sink.index, sink.name, sink.sample_spec.channels, sink.mute
        );
    }

    println!("Sources:");
    for source in context.source_info_list()? {
        println!("  #{} {}", source.index, source.name);
    }

    println!("Playback streams:");
    for input in context.sink_input_info_list()? {
        println!("  #{} {} -> sink #{}", input.index, input.name, input.sink);
    }

    println!("Cards:");
    for card in context.card_info_list()? {
        let profile = card
            .active_profile
            .map_or_else(|| "none".to_string(), |profile| profile.name);
        println!("  #{} {} (profile {profile})", card.index, card.name);
    }
    println!();

    let half = ChannelVolumes::uniform(2, Volume::new(Volume::NORMAL.raw() / 2));
    context.set_sink_volume("headphones", &half)?;
    context.set_sink_mute("speakers", true)?;

    if let Some(headphones) = context.sink_info_by_name("headphones")? {
        println!(
            "Headphones volume is now {:#x} of {:#x}",
            headphones.volume.max().raw(),
            Volume::NORMAL.raw()
        );
    }

    match context.sink_info_by_name("hdmi")? {
        Some(sink) => println!("Found {}", sink.name),
        None => println!("There is no sink called hdmi"),
    }

    context.close();
    Ok(())
}
