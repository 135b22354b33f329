// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Subscriber setup driven by the CLI verbosity flags.

use std::io::{self, IsTerminal};

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// How much the process logs to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// `--verbose`: workflow progress at INFO.
    Verbose,
    /// `--debug`: everything this crate and the HTTP layer emit.
    Debug,
}

impl Verbosity {
    /// Directive used when RUST_LOG is unset. `Debug` ignores RUST_LOG.
    fn default_directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Verbose => "info",
            Self::Debug => "repo_expert=debug,tower_http=debug,warn",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub verbosity: Verbosity,
    /// Colorize output. Defaults to whether stderr is a terminal.
    pub ansi: bool,
}

impl TelemetryConfig {
    /// Map `--verbose` / `--debug` to a config. `--debug` wins over `--verbose`.
    pub fn from_verbosity(verbose: bool, debug: bool) -> Self {
        let verbosity = match (verbose, debug) {
            (_, true) => Verbosity::Debug,
            (true, false) => Verbosity::Verbose,
            (false, false) => Verbosity::Quiet,
        };
        Self {
            verbosity,
            ansi: io::stderr().is_terminal(),
        }
    }

    /// The filter directive this config installs.
    pub fn filter_directive(&self) -> String {
        let fallback = self.verbosity.default_directive();
        if self.verbosity == Verbosity::Debug {
            return fallback.to_string();
        }
        std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Install the global subscriber, writing to stderr so `ask` keeps stdout for
/// the answer. Fails when called twice.
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<()> {
    let debug = config.verbosity == Verbosity::Debug;
    let filter = EnvFilter::try_new(config.filter_directive())
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.default_directive()));

    // Stage and invocation spans report their duration on close.
    let span_events = if debug { FmtSpan::CLOSE } else { FmtSpan::NONE };

    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi)
        .with_file(debug)
        .with_line_number(debug)
        .with_span_events(span_events)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}
