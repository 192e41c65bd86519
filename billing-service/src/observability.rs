use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` directives are kept; the
/// service and the billing core default to `info`.
pub fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["billing_service=info", "tariff_core=info"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
