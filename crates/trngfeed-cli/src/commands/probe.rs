use std::io::Write;

use trngfeed_core::{BlockAccumulator, FeedError, SerialSource, ZeroReadPolicy};

pub fn run(
    device: &str,
    speed: u32,
    block_size: usize,
    count: usize,
    local: bool,
) -> Result<(), FeedError> {
    if block_size == 0 {
        return Err(FeedError::config("block size must be at least one byte"));
    }
    let serial = super::serial_config(device, speed, local)?;
    let mut source = SerialSource::open(&serial)?;
    let mut accumulator = BlockAccumulator::new(block_size, ZeroReadPolicy::default());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for i in 0..count {
        let block = accumulator.fill_block(&mut source)?;
        writeln!(out, "{i:>6}  {}", hex(block.as_bytes()))
            .and_then(|()| out.flush())
            .map_err(|e| FeedError::sink_failure("write to stdout", e))?;
    }
    Ok(())
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_formatting() {
        assert_eq!(hex(&[0x00, 0x0f, 0xab, 0xff]), "000fabff");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let err = run("ttyU0", 115_200, 0, 1, false).unwrap_err();
        assert!(matches!(err, FeedError::Config { .. }));
    }
}
