//! 切片编号使用的 5x7 点阵数字.

use image::{Rgb, RgbImage};

/// 字形宽度 (点).
pub(crate) const GLYPH_W: u32 = 5;

/// 字形高度 (点).
pub(crate) const GLYPH_H: u32 = 7;

/// 每行 5 个点, 最高位在左.
const DIGITS: [[u8; 7]; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
];

/// 以 `scale` 倍放大绘制 `n` 的十进制表示, 左上角位于 `(x, y)`.
///
/// 超出图像的部分被裁掉.
pub(crate) fn draw_number(img: &mut RgbImage, n: usize, (x, y): (u32, u32), scale: u32, color: Rgb<u8>) {
    let scale = scale.max(1);
    let (width, height) = img.dimensions();
    for (pos, ch) in n.to_string().bytes().enumerate() {
        let glyph = &DIGITS[(ch - b'0') as usize];
        let x0 = x + pos as u32 * (GLYPH_W + 1) * scale;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits >> (GLYPH_W - 1 - col) & 1 == 0 {
                    continue;
                }
                let px = x0 + col * scale;
                let py = y + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let (u, v) = (px + dx, py + dy);
                        if u < width && v < height {
                            img.put_pixel(u, v, color);
                        }
                    }
                }
            }
        }
    }
}
