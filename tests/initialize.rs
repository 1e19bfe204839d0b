use std::time::{Duration, Instant};

use color_eyre::Result;
use pretty_assertions::assert_eq;
use stty_port::{Error, PortConfig, SerialPort};

mod common;
use common::{device, device_with, test_config, Tool};

#[tokio::test]
async fn invalid_data_bits_fail_before_any_io() -> Result<()> {
    let tool = Tool::ok();
    let device = device();

    let config = test_config(device.path(), &tool).set_data_bits(9);
    let mut port = SerialPort::new(config);

    assert!(matches!(
        port.initialize().await,
        Err(Error::InvalidParameter(_))
    ));
    assert!(!port.is_open());
    assert!(!tool.was_spawned());

    Ok(())
}

#[tokio::test]
async fn invalid_stop_bits_fail_before_any_io() -> Result<()> {
    let tool = Tool::ok();
    let device = device();

    let config = test_config(device.path(), &tool).set_stop_bits(3);
    let mut port = SerialPort::new(config);

    assert!(matches!(
        port.initialize().await,
        Err(Error::InvalidParameter(_))
    ));
    assert!(!tool.was_spawned());

    Ok(())
}

#[tokio::test]
async fn unset_device_fails_before_any_io() -> Result<()> {
    let tool = Tool::ok();

    let config = PortConfig::new("").set_stty_path(tool.path.clone());
    let mut port = SerialPort::new(config);

    assert!(matches!(
        port.initialize().await,
        Err(Error::InvalidParameter(_))
    ));
    assert!(!tool.was_spawned());

    Ok(())
}

#[tokio::test]
async fn tool_failure_reports_its_exit_code() -> Result<()> {
    let tool = Tool::failing(3);
    let device = device();

    let mut port = SerialPort::new(test_config(device.path(), &tool));
    let mut events = port.events();

    match port.initialize().await {
        Err(Error::ConfigurationFailed { exit_code }) => assert_eq!(exit_code, 3),
        other => panic!("Expected ConfigurationFailed, got {other:?}"),
    }

    assert!(tool.was_spawned());
    assert!(!port.is_open());

    // No open event fires for a failed attempt.
    assert!(events.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn hanging_tool_is_killed_and_reported_once() -> Result<()> {
    let tool = Tool::hanging(30);
    let device = device();

    let config = test_config(device.path(), &tool)
        .set_init_timeout(Some(Duration::from_millis(200)));
    let mut port = SerialPort::new(config);

    let before = Instant::now();
    let result = port.initialize().await;
    let elapsed = before.elapsed();

    assert!(matches!(result, Err(Error::InitializationTimeout)));
    assert!(
        elapsed < Duration::from_secs(5),
        "The tool must be terminated, not awaited: took {elapsed:?}"
    );
    assert!(tool.was_spawned());
    assert!(!port.is_open());

    Ok(())
}

#[tokio::test]
async fn unbounded_timeout_still_initializes() -> Result<()> {
    let tool = Tool::ok();
    let device = device();

    let config = test_config(device.path(), &tool).set_init_timeout(None);
    let mut port = SerialPort::new(config);

    port.initialize().await?;
    assert!(port.is_open());

    Ok(())
}

#[tokio::test]
async fn double_initialize_is_rejected_and_harmless() -> Result<()> {
    let tool = Tool::ok();
    let device = device_with(b"");

    let mut port = SerialPort::new(test_config(device.path(), &tool));

    port.initialize().await?;
    assert!(matches!(
        port.initialize().await,
        Err(Error::AlreadyInitialized)
    ));

    // The first attempt's channels are undisturbed.
    assert!(port.is_open());
    port.write("still alive\n").flushed().await?;

    let written = std::fs::read(device.path())?;
    assert_eq!(written, b"still alive\n");

    Ok(())
}

#[tokio::test]
async fn initialize_after_close_is_rejected() -> Result<()> {
    let tool = Tool::ok();
    let device = device();

    let mut port = SerialPort::new(test_config(device.path(), &tool));

    port.initialize().await?;
    port.close()?;

    assert!(matches!(
        port.initialize().await,
        Err(Error::AlreadyInitialized)
    ));

    Ok(())
}
