//! Integration tests for how `sound_bridge` reports failures.
//!
//! Every failure mode is provoked through the fault injection of the fake server. They are ignored
//! under Miri because they spawn threads and wait on real time.

use std::time::Duration;

use sound_bridge::fake::FakeServer;
use sound_bridge::info::{ChannelVolumes, Volume};
use sound_bridge::{Context, ContextFlags, ContextState, Error, ErrorCode, EventLoop};
use testing::{eventually, with_watchdog};

fn connected(server: &FakeServer) -> (EventLoop, Context) {
    let event_loop = EventLoop::new();
    let context = Context::builder(&event_loop, server.clone()).build();

    context.connect(None).unwrap();

    (event_loop, context)
}

#[cfg_attr(miri, ignore)]
#[test]
fn operation_before_connect_is_not_connected() {
    with_watchdog(|| {
        let event_loop = EventLoop::new();
        let server = FakeServer::new();
        let context = Context::builder(&event_loop, server.clone()).build();

        let result = context.server_info();

        assert!(matches!(
            result,
            Err(Error::NotConnected {
                state: ContextState::Unconnected
            })
        ));
        assert_eq!(server.operations_issued(), 0);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn connect_twice_is_already_connected() {
    with_watchdog(|| {
        let server = FakeServer::new();
        let (_event_loop, context) = connected(&server);

        assert!(matches!(context.connect(None), Err(Error::AlreadyConnected)));
        assert!(context.is_connected());
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn invalid_server_address_is_rejected() {
    with_watchdog(|| {
        let event_loop = EventLoop::new();
        let context = Context::builder(&event_loop, FakeServer::new())
            .flags(ContextFlags::NONE.no_autospawn())
            .build();

        let result = context.connect(Some(""));

        assert!(matches!(
            result,
            Err(Error::ConnectionFailed {
                code: ErrorCode::InvalidServer,
                ..
            })
        ));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn refused_connection_can_be_retried() {
    with_watchdog(|| {
        let event_loop = EventLoop::new();
        let server = FakeServer::builder().sink("speakers").build();
        let context = Context::builder(&event_loop, server.clone()).build();

        server.fail_connections(ErrorCode::ConnectionRefused);

        let result = context.connect(None);

        assert!(matches!(
            result,
            Err(Error::ConnectionFailed {
                state: ContextState::Failed,
                code: ErrorCode::ConnectionRefused,
            })
        ));
        assert_eq!(context.state(), ContextState::Failed);
        assert_eq!(context.last_error().unwrap(), ErrorCode::ConnectionRefused);

        server.clear_faults();
        context.connect(None).unwrap();

        assert_eq!(context.sink_info_list().unwrap().len(), 1);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn rejected_request_does_not_wait() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").build();
        let (_event_loop, context) = connected(&server);

        server.reject_next_request(ErrorCode::TooLarge);

        let result = context.sink_info_list();

        assert!(matches!(
            result,
            Err(Error::OperationRejected {
                code: ErrorCode::TooLarge
            })
        ));

        // The rejection is one-off and leaves the connection usable.
        assert_eq!(context.sink_info_list().unwrap().len(), 1);
        assert_eq!(server.operations_issued(), 1);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn failed_mutation_carries_server_reason() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").build();
        let (_event_loop, context) = connected(&server);

        server.fail_mutations(ErrorCode::Access);

        assert!(matches!(
            context.set_sink_mute("speakers", true),
            Err(Error::OperationFailed {
                code: ErrorCode::Access
            })
        ));
        assert!(matches!(
            context.load_module("module-null-sink", ""),
            Err(Error::OperationFailed {
                code: ErrorCode::Access
            })
        ));

        // Reads are unaffected and the failed mutation changed nothing.
        let sink = context.sink_info_by_name("speakers").unwrap().unwrap();
        assert!(!sink.mute);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn mutation_of_missing_object_fails() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").build();
        let (_event_loop, context) = connected(&server);

        assert!(matches!(
            context.set_sink_port("speakers", "nonexistent"),
            Err(Error::OperationFailed {
                code: ErrorCode::NoEntity
            })
        ));
        assert!(matches!(
            context.suspend_sink(7_u32, true),
            Err(Error::OperationFailed {
                code: ErrorCode::NoEntity
            })
        ));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn connection_lost_midway_through_list() {
    with_watchdog(|| {
        let server = FakeServer::builder()
            .sink("speakers")
            .sink("headphones")
            .sink("hdmi")
            .build();
        let (_event_loop, context) = connected(&server);

        server.disconnect_after_records(1);

        let result = context.sink_info_list();

        // A truncated list is never returned.
        assert!(matches!(result, Err(Error::OperationCancelled)));
        assert_eq!(context.state(), ContextState::Failed);
        assert_eq!(server.live_operations(), 0);

        assert!(matches!(
            context.sink_info_list(),
            Err(Error::NotConnected {
                state: ContextState::Failed
            })
        ));

        context.connect(None).unwrap();
        assert_eq!(context.sink_info_list().unwrap().len(), 3);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn missing_result_is_protocol_violation() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").build();
        let (_event_loop, context) = connected(&server);

        server.omit_next_result();

        let result = context.sink_info_by_name("speakers");

        assert!(matches!(
            result,
            Err(Error::ProtocolViolation {
                operation: "sink_info"
            })
        ));

        // Never retried: the request went out once.
        assert_eq!(server.operations_issued(), 1);

        assert!(context.sink_info_by_name("speakers").unwrap().is_some());
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn stalled_operation_times_out_and_abandons_context() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").build();
        let event_loop = EventLoop::new();
        let context = Context::builder(&event_loop, server.clone())
            .operation_timeout(Duration::from_millis(100))
            .build();

        context.connect(None).unwrap();

        server.stall();

        assert!(matches!(context.server_info(), Err(Error::TimedOut)));
        assert!(matches!(context.sink_info_list(), Err(Error::Abandoned)));
        assert!(matches!(context.connect(None), Err(Error::Abandoned)));

        // The late reply still arrives and finds nobody waiting for it.
        assert_eq!(server.live_operations(), 1);

        let mut guard = event_loop.lock();
        server.resume(&mut guard);
        drop(guard);

        eventually(|| server.live_operations() == 0);

        // The abandoned context stays unusable, but closing it is clean.
        assert!(matches!(context.server_info(), Err(Error::Abandoned)));
        context.close();
        assert_eq!(server.contexts_released(), 1);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn stalled_connect_times_out() {
    with_watchdog(|| {
        let server = FakeServer::new();
        let event_loop = EventLoop::new();
        let context = Context::builder(&event_loop, server.clone())
            .operation_timeout(Duration::from_millis(100))
            .build();

        server.stall();

        assert!(matches!(context.connect(None), Err(Error::TimedOut)));
        assert!(context.state().is_connecting());
        assert!(matches!(context.server_info(), Err(Error::Abandoned)));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn slow_list_times_out_as_a_whole() {
    with_watchdog(|| {
        let server = FakeServer::builder()
            .sink("speakers")
            .sink("headphones")
            .sink("hdmi")
            .sink("usb")
            .build();
        let event_loop = EventLoop::new();
        let context = Context::builder(&event_loop, server.clone())
            .operation_timeout(Duration::from_millis(200))
            .build();
        context.connect(None).unwrap();

        // Every gap between records is shorter than the timeout, the whole list is not.
        server.pace_records(Duration::from_millis(150));

        assert!(matches!(context.sink_info_list(), Err(Error::TimedOut)));
        assert!(matches!(context.sink_info_list(), Err(Error::Abandoned)));

        eventually(|| server.live_operations() == 0);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn slow_list_within_timeout_completes() {
    with_watchdog(|| {
        let server = FakeServer::builder()
            .sink("speakers")
            .sink("headphones")
            .sink("hdmi")
            .build();
        let event_loop = EventLoop::new();
        let context = Context::builder(&event_loop, server.clone())
            .operation_timeout(Duration::from_secs(5))
            .build();
        context.connect(None).unwrap();

        server.pace_records(Duration::from_millis(20));

        assert_eq!(context.sink_info_list().unwrap().len(), 3);
        assert!(context.sink_info_by_name("hdmi").unwrap().is_some());
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn oversized_volume_is_refused_before_issue() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").source("microphone").build();
        let (_event_loop, context) = connected(&server);

        let before = context.sink_info_by_name("speakers").unwrap().unwrap().volume;
        let issued = server.operations_issued();
        let oversized = ChannelVolumes::uniform(40, Volume::MUTED);

        assert!(matches!(
            context.set_sink_volume("speakers", &oversized),
            Err(Error::OperationRejected {
                code: ErrorCode::Invalid
            })
        ));
        assert!(matches!(
            context.set_source_volume("microphone", &oversized),
            Err(Error::OperationRejected {
                code: ErrorCode::Invalid
            })
        ));
        assert_eq!(server.operations_issued(), issued);

        let after = context.sink_info_by_name("speakers").unwrap().unwrap().volume;
        assert_eq!(after, before);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn closed_context_refuses_operations() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").build();
        let (_event_loop, context) = connected(&server);

        context.close();

        assert!(matches!(context.sink_info_list(), Err(Error::Closed)));
        assert!(matches!(context.connect(None), Err(Error::Closed)));
        assert!(matches!(context.server_name(), Err(Error::Closed)));
        assert_eq!(context.state(), ContextState::Terminated);

        // Harmless after close.
        context.disconnect();
        assert_eq!(server.disconnects(), 1);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn stopped_loop_fails_operations() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").build();
        let (event_loop, context) = connected(&server);

        event_loop.stop();

        assert!(matches!(context.sink_info_list(), Err(Error::LoopStopped)));
        assert!(matches!(context.set_sink_mute("speakers", true), Err(Error::LoopStopped)));
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn error_messages_name_the_cause() {
    with_watchdog(|| {
        let server = FakeServer::builder().sink("speakers").build();
        let (_event_loop, context) = connected(&server);

        server.fail_mutations(ErrorCode::Access);
        let error = context.set_sink_mute("speakers", true).unwrap_err();

        assert!(error.to_string().contains(ErrorCode::Access.text()));
    });
}
