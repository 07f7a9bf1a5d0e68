//! Unit tests for ImageData and texture identity

use std::rc::Rc;

use crate::error::Error;
use crate::renderer::mock_backend::MockTexture;
use crate::renderer::texture::{same_texture, ImageData, Texture2D};

// ============================================================================
// IMAGE DATA
// ============================================================================

#[test]
fn test_solid_image() {
    let img = ImageData::solid(2, 1, [255, 0, 0, 128]);
    assert_eq!(img.pixels, vec![255, 0, 0, 128, 255, 0, 0, 128]);
}

#[test]
fn test_from_rgba8_rejects_wrong_length() {
    match ImageData::from_rgba8(2, 2, vec![0; 15]) {
        Err(Error::InvalidResource(_)) => {}
        other => panic!("Expected InvalidResource, got {:?}", other),
    }
    assert!(ImageData::from_rgba8(2, 2, vec![0; 16]).is_ok());
}

#[test]
fn test_decode_png_with_flip() {
    // 1x2 image: top red, bottom blue
    let mut src = image::RgbaImage::new(1, 2);
    src.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
    src.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
    let mut png = std::io::Cursor::new(Vec::new());
    src.write_to(&mut png, image::ImageFormat::Png).unwrap();
    let png = png.into_inner();

    let upright = ImageData::decode(&png, false).unwrap();
    assert_eq!(&upright.pixels[..4], &[255, 0, 0, 255]);

    let flipped = ImageData::decode(&png, true).unwrap();
    assert_eq!((flipped.width, flipped.height), (1, 2));
    assert_eq!(&flipped.pixels[..4], &[0, 0, 255, 255]);
}

#[test]
fn test_decode_garbage_is_format_error() {
    match ImageData::decode(b"not an image", false) {
        Err(Error::Format(_)) => {}
        other => panic!("Expected Format, got {:?}", other),
    }
}

#[test]
fn test_load_missing_file_is_io_error() {
    match ImageData::load("/definitely/not/here.png", false) {
        Err(Error::Io(msg)) => assert!(msg.contains("here.png")),
        other => panic!("Expected Io, got {:?}", other),
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

#[test]
fn test_same_texture_is_pointer_identity() {
    let a: Rc<dyn Texture2D> = Rc::new(MockTexture::new(4, 4));
    let a2 = a.clone();
    let b: Rc<dyn Texture2D> = Rc::new(MockTexture::new(4, 4));

    assert!(same_texture(&a, &a2));
    assert!(!same_texture(&a, &b), "equal pixels do not make equal textures");
}
