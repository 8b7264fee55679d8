use std::env;

use rusty_fork::rusty_fork_test;
use tracing_subscriber::fmt::format::FmtSpan;

use s3copier::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";

pub fn init_tracing(config: &TracingConfig) {
    let fmt_span = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let tracing_level = config.tracing_level;
    let (event_filter, show_target) = if config.aws_sdk_tracing {
        (
            format!(
                "s3copier={tracing_level},aws_smithy_runtime={tracing_level},aws_config={tracing_level},aws_sigv4={tracing_level}"
            ),
            true,
        )
    } else if let Ok(env_filter) = env::var(EVENT_FILTER_ENV_VAR) {
        (env_filter, true)
    } else {
        (format!("s3copier={tracing_level}"), false)
    };

    let subscriber_builder = tracing_subscriber::fmt()
        .compact()
        .with_ansi(!config.disable_color_tracing)
        .with_span_events(fmt_span)
        .with_env_filter(event_filter)
        .with_target(show_target);

    if config.json_tracing {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }
}

rusty_fork_test! {
    #[test]
    fn init_json_tracing() {
        init_tracing(&tracing_config(true, false, false, false));
    }

    #[test]
    fn init_aws_sdk_tracing() {
        init_tracing(&tracing_config(false, true, false, false));
    }

    #[test]
    fn init_normal_tracing() {
        // runs in a separate process
        unsafe { env::remove_var(EVENT_FILTER_ENV_VAR) };

        init_tracing(&tracing_config(false, false, false, false));
    }

    #[test]
    fn init_span_events_tracing() {
        init_tracing(&tracing_config(false, true, true, false));
    }

    #[test]
    fn init_disable_color_tracing() {
        init_tracing(&tracing_config(false, false, false, true));
    }

    #[test]
    fn init_with_env() {
        // runs in a separate process
        unsafe { env::set_var(EVENT_FILTER_ENV_VAR, "s3copier=trace") };

        init_tracing(&tracing_config(false, false, false, true));
    }
}

#[cfg(test)]
fn tracing_config(
    json_tracing: bool,
    aws_sdk_tracing: bool,
    span_events_tracing: bool,
    disable_color_tracing: bool,
) -> TracingConfig {
    TracingConfig {
        tracing_level: log::Level::Info,
        json_tracing,
        aws_sdk_tracing,
        span_events_tracing,
        disable_color_tracing,
    }
}
