/// Duration of a RIFF/WAVE payload, read from its header.
///
/// Streaming encoders (including OpenAI's speech endpoint) often write a
/// placeholder data size (`0` or `0xFFFFFFFF`); in that case the rest of the
/// buffer after the data chunk header is taken as sample data.
pub fn wav_duration_secs(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut byte_rate: Option<u32> = None;
    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(bytes, pos + 4)?;
        let body = pos + 8;

        if id == b"fmt " {
            // audio_format(2) channels(2) sample_rate(4) byte_rate(4)
            byte_rate = Some(read_u32(bytes, body + 8)?);
        } else if id == b"data" {
            let rate = byte_rate.filter(|r| *r > 0)?;
            let available = (bytes.len() - body) as u64;
            let declared = size as u64;
            let data_len = if size == 0 || size == u32::MAX || declared > available {
                available
            } else {
                declared
            };
            return Some(data_len as f64 / rate as f64);
        }

        // Chunks are word aligned.
        pos = body.checked_add(size as usize + (size as usize & 1))?;
    }
    None
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}
