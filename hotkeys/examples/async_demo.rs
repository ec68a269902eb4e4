use std::time::Duration;

use anyhow::{Context, Result};
use env_logger::Env;
use hotkeys::{Callback, Hotkeys};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .context("failed to build tokio runtime")?;

    let hotkeys = Hotkeys::builder()
        .with_scheduler(runtime.handle().clone())
        .build()
        .context("failed to open terminal input")?;
    let (quit_tx, quit_rx) = flume::bounded::<()>(1);

    hotkeys.register_hotkey(
        "f9",
        Callback::sync(|_| println!("F9: fast action done")),
    )?;
    // Runs on the tokio runtime; the reader keeps handling keys meanwhile.
    hotkeys.register_hotkey(
        "f10",
        Callback::asynchronous(|event| async move {
            println!("{event}: slow task started");
            tokio::time::sleep(Duration::from_secs(2)).await;
            println!("{event}: slow task done");
        }),
    )?;
    hotkeys.register_hotkey(
        "ctrl+c",
        Callback::sync(move |_| {
            let _ = quit_tx.try_send(());
        }),
    )?;

    hotkeys.start().context("failed to start hotkeys")?;
    println!("F9 fast action, F10 slow task, Ctrl+C quits");

    runtime.block_on(async {
        let _ = quit_rx.recv_async().await;
    });

    hotkeys.stop()?;
    println!("bye");
    Ok(())
}
