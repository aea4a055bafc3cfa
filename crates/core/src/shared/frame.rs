use ndarray::ArrayView3;

/// A single captured camera frame: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens inside the capture adapter; everything
/// downstream treats the buffer as packed RGB24.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            sequence,
        }
    }

    /// Solid-color RGB frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], sequence: usize) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height, 3, sequence)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Monotonic number assigned by the capture source.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Overwrites one pixel; coordinates outside the frame are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let channels = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        let n = channels.min(3);
        self.data[offset..offset + n].copy_from_slice(&rgb[..n]);
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
