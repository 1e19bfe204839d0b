use clap::Parser;
use stty_port::{cli, logging, port::PortEvent, SerialPort};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    logging::init().await;

    let cli = cli::Cli::parse();
    let config = cli.port_config();

    let mut port = SerialPort::new(config);
    let events = port.events();

    if let Err(e) = port.initialize().await {
        error!(%e, "Could not initialize port");
        std::process::exit(1);
    }

    for line in &cli.send {
        let ack = port.write(format!("{line}\r\n"));
        if let Err(e) = ack.flushed().await {
            error!(%e, "Write failed");
        }
    }

    let mut events = BroadcastStream::new(events);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C, closing port");
                if let Err(e) = port.close() {
                    error!(%e, "Close failed");
                }
            }
            event = events.next() => match event {
                Some(Ok(PortEvent::Data(bytes))) => {
                    print!("{}", String::from_utf8_lossy(&bytes));
                }
                Some(Ok(PortEvent::End)) => info!("Device end of input"),
                Some(Ok(PortEvent::Error(e))) => error!(%e, "Device error"),
                Some(Ok(PortEvent::Closed)) => break,
                Some(Ok(PortEvent::Open)) | Some(Err(_)) => {}
                None => break,
            },
        }
    }
}
