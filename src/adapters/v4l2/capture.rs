use anyhow::{anyhow, Result};
use image::{ImageFormat, RgbImage};
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::application::ports::FrameSource;
use crate::domain::camera::CameraMode;
use crate::domain::errors::{DomainError, DomainResult};

/// Captura física de frames de una webcam vía V4L2 (MMAP).
pub struct V4l2Capture {
    // El stream comparte el handle del dispositivo, no necesita que `Device` siga vivo.
    stream: Stream<'static>,
    fourcc: FourCC,
    width: u32,
    height: u32,
}

impl V4l2Capture {
    /// Abre el dispositivo y negocia formato, tamaño y FPS.
    pub fn open(device: &str, mode: &CameraMode) -> Result<Self> {
        let dev = Device::with_path(device)?;

        let mut fmt = dev.format()?;
        let b = mode.format.as_bytes();
        if b.len() != 4 {
            return Err(anyhow!("FourCC debe tener 4 caracteres: {}", mode.format));
        }
        fmt.fourcc = FourCC::new(&[b[0], b[1], b[2], b[3]]);
        fmt.width = mode.size.width;
        fmt.height = mode.size.height;

        // El driver puede ajustar a los valores soportados más cercanos
        let actual_fmt = dev.set_format(&fmt)?;

        let mut params = dev.params()?;
        params.interval.numerator = 1;
        params.interval.denominator = mode.fps.max(1);
        let _ = dev.set_params(&params);

        let stream = Stream::with_buffers(&dev, v4l::buffer::Type::VideoCapture, 4)?;

        tracing::info!(
            "Cámara {} abierta: {}x{} [{}] a {} FPS",
            device, actual_fmt.width, actual_fmt.height, actual_fmt.fourcc, mode.fps
        );

        Ok(Self {
            stream,
            fourcc: actual_fmt.fourcc,
            width: actual_fmt.width,
            height: actual_fmt.height,
        })
    }

    /// Captura el siguiente frame en RGB.
    pub fn next_rgb(&mut self) -> Result<RgbImage> {
        let (data, _) = self.stream.next()?;
        let fcc_str = self.fourcc.str().map_err(|_| anyhow!("FourCC inválido"))?;

        match fcc_str {
            "MJPG" => {
                let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
                Ok(img.to_rgb8())
            }
            "YUYV" => Ok(yuyv_to_rgb(data, self.width, self.height)),
            _ => Err(anyhow!("Formato de cámara {} no soportado", fcc_str)),
        }
    }
}

impl FrameSource for V4l2Capture {
    fn next_frame(&mut self) -> DomainResult<Option<RgbImage>> {
        // Una webcam no se agota: cualquier fallo es un frame perdido.
        self.next_rgb()
            .map(Some)
            .map_err(|e| DomainError::SourceUnavailable(format!("webcam frame: {e}")))
    }
}

/// Convierte un buffer YUYV (YUV 4:2:2) a RGB con BT.601.
fn yuyv_to_rgb(yuyv: &[u8], w: u32, h: u32) -> RgbImage {
    let mut out = RgbImage::new(w, h);

    // Cada bloque [Y0, U, Y1, V] define dos píxeles
    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        let convert = |y: f32| {
            image::Rgb([
                (y + 1.402 * v).clamp(0.0, 255.0) as u8,
                (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8,
                (y + 1.772 * u).clamp(0.0, 255.0) as u8,
            ])
        };

        let pixel_idx = i as u32 * 2;
        let x = pixel_idx % w;
        let y = pixel_idx / w;
        if y < h {
            out.put_pixel(x, y, convert(chunk[0] as f32));
            if x + 1 < w {
                out.put_pixel(x + 1, y, convert(chunk[2] as f32));
            }
        }
    }
    out
}
