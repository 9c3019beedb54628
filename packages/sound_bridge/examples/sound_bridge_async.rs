//! Awaits bridged operations from async code.
//!
//! Each awaited operation runs on its own helper thread, so the executor thread is never blocked
//! waiting for the server.
//!
//! Run with: `cargo run --example sound_bridge_async`.

use futures::executor::block_on;
use futures::future::join_all;
use sound_bridge::fake::FakeServer;
use sound_bridge::{Context, EventLoop};

fn main() -> sound_bridge::Result<()> {
    let event_loop = EventLoop::new();

    let server = FakeServer::builder()
        .sink("speakers")
        .sink("headphones")
        .sink("hdmi")
        .build();

    let context = Context::builder(&event_loop, server).build();

    block_on(async {
        context.connect_async(None).await?;

        let names = context
            .spawn(|context| context.sink_info_list())
            .await?
            .into_iter()
            .map(|sink| sink.name)
            .collect::<Vec<_>>();

        // Operations on one context still run one at a time, in whatever order the helper
        // threads reach the context.
        let mutes = names.iter().cloned().map(|name| {
            context.spawn(move |context| context.set_sink_mute(name.as_str(), true))
        });

        for result in join_all(mutes).await {
            result?;
        }

        for sink in context.spawn(|context| context.sink_info_list()).await? {
            println!("{} muted: {}", sink.name, sink.mute);
        }

        Ok(())
    })
}
