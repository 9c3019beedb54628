//! Integration tests for the server objects beyond sinks: sources, streams, modules, clients and
//! cards.

use sound_bridge::fake::FakeServer;
use sound_bridge::info::{ChannelVolumes, DeviceState, PortDirection, Volume};
use sound_bridge::{Context, Error, ErrorCode, EventLoop};
use testing::with_watchdog;

fn connected(server: &FakeServer, name: &str) -> (EventLoop, Context) {
    let event_loop = EventLoop::new();
    let context = Context::builder(&event_loop, server.clone())
        .name(name)
        .build();

    context.connect(None).unwrap();

    (event_loop, context)
}

#[cfg_attr(miri, ignore)]
#[test]
fn sources_mirror_sinks() {
    with_watchdog(|| {
        let server = FakeServer::builder()
            .source("microphone")
            .source("line-in")
            .default_source("line-in")
            .build();
        let (_event_loop, context) = connected(&server, "sources");

        let sources = context.source_info_list().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].name, "line-in");

        assert_eq!(context.server_info().unwrap().default_source_name, "line-in");
        assert!(context.source_info_by_index(9).unwrap().is_none());

        let loud = ChannelVolumes::uniform(2, Volume::NORMAL);
        context.set_source_volume("microphone", &loud).unwrap();
        context.set_source_mute(1_u32, true).unwrap();
        context.suspend_source("line-in", true).unwrap();

        let microphone = context.source_info_by_name("microphone").unwrap().unwrap();
        assert_eq!(microphone.volume.max(), Volume::NORMAL);
        assert!(!microphone.mute);

        let line_in = context.source_info_by_index(1).unwrap().unwrap();
        assert!(line_in.mute);
        assert_eq!(line_in.state, DeviceState::Suspended);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn source_port_switches() {
    with_watchdog(|| {
        let server = FakeServer::builder().source("microphone").build();
        let (_event_loop, context) = connected(&server, "ports");

        let source = context.source_info_by_name("microphone").unwrap().unwrap();
        let last_port = source.ports.last().unwrap().name.clone();

        context.set_source_port("microphone", &last_port).unwrap();

        let source = context.source_info_by_name("microphone").unwrap().unwrap();
        assert_eq!(source.active_port.unwrap().name, last_port);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn streams_are_listed_and_looked_up() {
    with_watchdog(|| {
        let server = FakeServer::builder()
            .sink("speakers")
            .source("microphone")
            .sink_input("music")
            .sink_input("notification")
            .source_output("recorder")
            .build();
        let (_event_loop, context) = connected(&server, "streams");

        let inputs = context.sink_input_info_list().unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].name, "music");
        assert_eq!(inputs[0].sink, 0);
        assert_eq!(inputs[0].client, None);

        let notification = context.sink_input_info(inputs[1].index).unwrap().unwrap();
        assert_eq!(notification.name, "notification");

        let outputs = context.source_output_info_list().unwrap();
        assert_eq!(outputs.len(), 1);

        let recorder = context.source_output_info(outputs[0].index).unwrap().unwrap();
        assert_eq!(recorder.name, "recorder");
        assert_eq!(recorder.source, 0);

        assert!(context.sink_input_info(1000).unwrap().is_none());
        assert!(context.source_output_info(1000).unwrap().is_none());
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn modules_load_and_unload() {
    with_watchdog(|| {
        let server = FakeServer::builder()
            .module("module-native-protocol-unix", "")
            .build();
        let (_event_loop, context) = connected(&server, "modules");

        let index = context
            .load_module("module-null-sink", "sink_name=null")
            .unwrap();

        let module = context.module_info(index).unwrap().unwrap();
        assert_eq!(module.name, "module-null-sink");
        assert_eq!(module.argument.as_deref(), Some("sink_name=null"));

        let names: Vec<_> = context
            .module_info_list()
            .unwrap()
            .into_iter()
            .map(|module| module.name)
            .collect();
        assert_eq!(names, ["module-native-protocol-unix", "module-null-sink"]);

        context.unload_module(index).unwrap();
        assert!(context.module_info(index).unwrap().is_none());

        assert!(matches!(
            context.unload_module(index),
            Err(Error::OperationFailed {
                code: ErrorCode::NoEntity
            })
        ));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn module_that_fails_to_initialize() {
    with_watchdog(|| {
        let server = FakeServer::new();
        let (_event_loop, context) = connected(&server, "modules");

        assert!(matches!(
            context.load_module("no-such-thing", ""),
            Err(Error::OperationFailed {
                code: ErrorCode::ModInitFailed
            })
        ));
        assert!(context.module_info_list().unwrap().is_empty());
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn clients_include_own_connection() {
    with_watchdog(|| {
        let server = FakeServer::builder().client("volume-control").build();
        let (_event_loop, context) = connected(&server, "inspector");

        let own_index = context.index().unwrap().unwrap();

        let own = context.client_info(own_index).unwrap().unwrap();
        assert_eq!(own.name, "inspector");

        let clients = context.client_info_list().unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(server.client_count(), 2);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn killed_client_disappears() {
    with_watchdog(|| {
        let server = FakeServer::builder().client("volume-control").build();
        let (_event_loop, context) = connected(&server, "inspector");

        let victim = context
            .client_info_list()
            .unwrap()
            .into_iter()
            .find(|client| client.name == "volume-control")
            .unwrap();

        context.kill_client(victim.index).unwrap();

        assert!(context.client_info(victim.index).unwrap().is_none());
        assert_eq!(server.client_count(), 1);
        assert!(matches!(
            context.kill_client(victim.index),
            Err(Error::OperationFailed {
                code: ErrorCode::NoEntity
            })
        ));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn card_profiles_and_ports() {
    with_watchdog(|| {
        let server = FakeServer::builder().card("built-in").card("usb-headset").build();
        let (_event_loop, context) = connected(&server, "cards");

        let cards = context.card_info_list().unwrap();
        assert_eq!(cards.len(), 2);

        let card = context.card_info_by_name("usb-headset").unwrap().unwrap();
        assert_eq!(card.index, 1);
        assert_eq!(
            card.active_profile.as_ref().map(|profile| profile.name.as_str()),
            Some("output:analog-stereo")
        );

        let port = card.ports.first().unwrap();
        assert_eq!(port.direction, PortDirection::Output);
        assert_eq!(port.profiles, ["output:analog-stereo"]);

        context.set_card_profile("usb-headset", "off").unwrap();
        context
            .set_port_latency_offset("usb-headset", &port.name, 1500)
            .unwrap();

        let card = context.card_info_by_index(1).unwrap().unwrap();
        assert_eq!(card.active_profile.unwrap().name, "off");
        assert_eq!(card.ports.first().unwrap().latency_offset_usec, 1500);

        // The other card is untouched.
        let other = context.card_info_by_index(0).unwrap().unwrap();
        assert_eq!(other.active_profile.unwrap().name, "output:analog-stereo");

        assert!(matches!(
            context.set_card_profile(0_u32, "nonexistent"),
            Err(Error::OperationFailed {
                code: ErrorCode::NoEntity
            })
        ));
        assert!(context.card_info_by_name("nonexistent").unwrap().is_none());
    });
}
