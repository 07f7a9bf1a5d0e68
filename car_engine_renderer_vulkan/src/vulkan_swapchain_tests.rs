//! Unit tests for the swapchain surface choices
//!
//! Pure functions only; no device or surface is needed.

use super::*;

fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR { format, color_space }
}

fn capabilities(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min_count,
        max_image_count: max_count,
        current_extent: vk::Extent2D { width: current.0, height: current.1 },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        ..Default::default()
    }
}

// ============================================================================
// SURFACE FORMAT
// ============================================================================

#[test]
fn test_prefers_bgra8_srgb() {
    let formats = [
        format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];
    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
}

#[test]
fn test_falls_back_to_first_format() {
    let formats = [
        format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];
    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM, "first available format is the fallback");
}

#[test]
fn test_srgb_format_needs_matching_color_space() {
    let formats = [
        format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
    ];
    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::R16G16B16A16_SFLOAT);
}

#[test]
fn test_undefined_format_means_free_choice() {
    let formats = [format(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
}

#[test]
fn test_no_formats() {
    assert!(choose_surface_format(&[]).is_none());
}

// ============================================================================
// PRESENT MODE
// ============================================================================

#[test]
fn test_vsync_uses_fifo() {
    let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_no_vsync_prefers_mailbox() {
    let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
    assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
}

#[test]
fn test_no_vsync_without_mailbox_uses_fifo() {
    let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
}

// ============================================================================
// EXTENT AND IMAGE COUNT
// ============================================================================

#[test]
fn test_extent_follows_surface() {
    let caps = capabilities((1280, 720), 2, 3);
    let extent = choose_extent(&caps, (800, 600));
    assert_eq!((extent.width, extent.height), (1280, 720));
}

#[test]
fn test_extent_clamped_when_surface_undecided() {
    let caps = capabilities((u32::MAX, u32::MAX), 2, 3);
    let extent = choose_extent(&caps, (800, 600));
    assert_eq!((extent.width, extent.height), (800, 600));

    let extent = choose_extent(&caps, (10_000, 0));
    assert_eq!((extent.width, extent.height), (4096, 1));
}

#[test]
fn test_image_count() {
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 3)), 3);
    assert_eq!(choose_image_count(&capabilities((1, 1), 3, 3)), 3, "capped by the maximum");
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 0)), 3, "0 means no maximum");
}

// ============================================================================
// IMAGE SHARING
// ============================================================================

fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties { queue_flags: flags, queue_count: 1, ..Default::default() }
}

#[test]
fn test_shared_family_is_exclusive() {
    let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)];
    let chosen = crate::vulkan_device::find_queue_families(&families, |_| true).unwrap();

    let (mode, indices) = image_sharing(&chosen);
    assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
    assert!(indices.is_empty());
}

#[test]
fn test_separate_present_family_is_concurrent() {
    // Family 1 can present but has no graphics support
    let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::COMPUTE)];
    let chosen = crate::vulkan_device::find_queue_families(&families, |i| i == 1).unwrap();
    assert_eq!((chosen.graphics, chosen.present), (0, 1));

    let (mode, indices) = image_sharing(&chosen);
    assert_eq!(mode, vk::SharingMode::CONCURRENT);
    assert_eq!(indices, vec![0, 1], "both families share the images");
}
