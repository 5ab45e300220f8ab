pub const DEFAULT_WRITER_CAPACITY: usize = 1200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("buffer underrun: needed {needed} bytes, {remaining} remaining")]
    BufferUnderrun { needed: usize, remaining: usize },
    #[error("string of {0} bytes exceeds the u16 length prefix")]
    StringTooLong(usize),
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
}

/// Big-endian writer over a growable buffer.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    buffer: Vec<u8>,
    position: usize,
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WRITER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(1)],
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.buffer.truncate(self.position);
        self.buffer
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_bits().to_be_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_vec3(&mut self, value: glam::Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| CodecError::StringTooLong(bytes.len()))?;
        self.write_u16(len);
        self.write_bytes(bytes);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
    }

    fn ensure_capacity(&mut self, additional: usize) {
        let required = self.position + additional;
        if required > self.buffer.len() {
            let new_capacity = (self.buffer.len() * 2).max(required);
            self.buffer.resize(new_capacity, 0);
        }
    }
}

/// Bounds-checked inverse of [`PacketWriter`].
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn can_read(&self, bytes: usize) -> bool {
        self.remaining() >= bytes
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        self.read_u32().map(f32::from_bits)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_vec3(&mut self) -> Result<glam::Vec3, CodecError> {
        Ok(glam::Vec3::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        self.take(count)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        if !self.can_read(count) {
            return Err(CodecError::BufferUnderrun {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_big_endian() {
        let mut writer = PacketWriter::new();
        writer.write_u16(0x0102);
        writer.write_u32(0x0304_0506);
        writer.write_f32(1.0);

        assert_eq!(
            writer.as_slice(),
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x3F, 0x80, 0x00, 0x00]
        );
    }

    #[test]
    fn test_mixed_fields_read_back() {
        let mut writer = PacketWriter::new();
        writer.write_u8(7);
        writer.write_bool(true);
        writer.write_string("tänk").unwrap();
        writer.write_f32(-12.5);
        writer.write_vec3(glam::Vec3::new(1.0, 2.0, 3.0));

        let data = writer.into_vec();
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_string().unwrap(), "tänk");
        assert_eq!(reader.read_f32().unwrap(), -12.5);
        assert_eq!(reader.read_vec3().unwrap(), glam::Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_writer_grows_by_doubling() {
        let mut writer = PacketWriter::with_capacity(4);
        writer.write_u32(1);
        assert_eq!(writer.capacity(), 4);
        writer.write_u8(2);
        assert_eq!(writer.capacity(), 8);
        writer.write_bytes(&[0; 20]);
        assert_eq!(writer.capacity(), 25);
        assert_eq!(writer.position(), 25);
    }

    #[test]
    fn test_read_past_end_is_underrun() {
        let data = [0u8; 3];
        let mut reader = PacketReader::new(&data);
        assert_eq!(
            reader.read_u32(),
            Err(CodecError::BufferUnderrun {
                needed: 4,
                remaining: 3
            })
        );
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_truncated_string_is_underrun() {
        let mut writer = PacketWriter::new();
        writer.write_u16(10);
        writer.write_bytes(b"abc");
        let data = writer.into_vec();

        let mut reader = PacketReader::new(&data);
        assert!(matches!(
            reader.read_string(),
            Err(CodecError::BufferUnderrun { .. })
        ));
    }

    #[test]
    fn test_oversized_string_rejected() {
        let mut writer = PacketWriter::new();
        let long = "x".repeat(u16::MAX as usize + 1);
        assert_eq!(
            writer.write_string(&long),
            Err(CodecError::StringTooLong(u16::MAX as usize + 1))
        );
    }
}
