//! Wire format of the fixture: the 512 channels are sent in chunks of at
//! most 62 bytes, each preceded by the little-endian index of its first
//! channel.

/// Channels in one universe.
pub const CHANNELS: usize = 512;
/// Channel bytes carried by one chunk.
pub const CHUNK_CHANNELS: usize = 62;
/// Size of the running channel counter in front of each chunk.
pub const CHUNK_HEADER: usize = 2;
/// Chunks per frame: eight full ones and a 16 channel tail.
pub const CHUNKS: usize = CHANNELS.div_ceil(CHUNK_CHANNELS);
/// Encoded frame size.
pub const FRAME_LEN: usize = CHUNKS * CHUNK_HEADER + CHANNELS;

/// Flat channel values for one render cycle.
pub type ChannelBuffer = [u8; CHANNELS];
/// Encoded frame ready for the transport.
pub type WireFrame = [u8; FRAME_LEN];

const _: () = assert!(FRAME_LEN == 530);

/// Encodes a channel buffer into its wire frame. Total over all inputs.
pub fn encode(channels: &ChannelBuffer) -> WireFrame {
    let mut frame = [0u8; FRAME_LEN];
    let mut out = 0;

    for (index, chunk) in channels.chunks(CHUNK_CHANNELS).enumerate() {
        let first = (index * CHUNK_CHANNELS) as u16;
        frame[out..out + CHUNK_HEADER].copy_from_slice(&first.to_le_bytes());
        out += CHUNK_HEADER;
        frame[out..out + chunk.len()].copy_from_slice(chunk);
        out += chunk.len();
    }

    debug_assert_eq!(out, FRAME_LEN);
    frame
}
