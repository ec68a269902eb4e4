use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use env_logger::Env;
use hotkeys::{Callback, Hotkeys};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let hotkeys = Hotkeys::new().context("failed to open terminal input")?;
    let (quit_tx, quit_rx) = flume::bounded::<()>(1);

    hotkeys.register_hotkey(
        "f9",
        Callback::sync(|_| println!("F9: fast action done")),
    )?;
    // Sync callbacks run on the reader thread, so keys typed during this
    // one are handled once it returns.
    hotkeys.register_hotkey(
        "f10",
        Callback::sync(|_| {
            println!("F10: slow action started");
            thread::sleep(Duration::from_secs(2));
            println!("F10: slow action done");
        }),
    )?;
    hotkeys.register_hotkey(
        "ctrl+c",
        Callback::sync(move |_| {
            let _ = quit_tx.try_send(());
        }),
    )?;

    hotkeys.start().context("failed to start hotkeys")?;
    println!("F9 fast action, F10 slow action, Ctrl+C quits");

    while quit_rx.recv_timeout(Duration::from_millis(200)).is_err() {
        while let Some(event) = hotkeys.unhandled_key() {
            println!("unhandled key: {event} {:?}", event.raw());
        }
    }

    hotkeys.stop()?;
    println!("bye");
    Ok(())
}
