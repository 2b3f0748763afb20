/// Replace the default panic hook with one that emits a structured `tracing`
/// error event instead of writing directly to stderr, so panics in a spawned
/// task surface through the same log pipeline as everything else.
pub fn install() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "unknown location".to_string());
        let message = panic_message(info);
        tracing::error!(location = %location, message = %message, "panic");
        default_hook(info);
    }));
}

fn panic_message<'a>(info: &'a std::panic::PanicHookInfo<'a>) -> &'a str {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
