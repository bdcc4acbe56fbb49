use indicatif::ProgressBar;
use ndarray::{Array3, Array4};
use nifti::writer::WriterOptions;
use seg_snap::prelude::*;
use seg_snap::render::{render_background_panels, render_overlay_panels, PanelLayout};
use seg_snap::xnat::{RemoteFile, ScanInfo};
use simple_logger::SimpleLogger;
use std::path::Path;

/// 以 `(ci, cj, ck)` 为中心, 半径为 `r` 的实心球.
fn ball(shape: Idx3d, (ci, cj, ck): (f32, f32, f32), r: f32) -> Array3<f32> {
    Array3::from_shape_fn(shape, |(i, j, k)| {
        let d2 = (i as f32 - ci).powi(2) + (j as f32 - cj).powi(2) + (k as f32 - ck).powi(2);
        if d2 < r * r {
            1.0
        } else {
            0.0
        }
    })
}

fn head(shape: Idx3d) -> Array3<f32> {
    Array3::from_shape_fn(shape, |(i, j, k)| (i + 2 * j + 3 * k) as f32)
}

fn write(path: &Path, array: &Array3<f32>) {
    WriterOptions::new(path).write_nifti(array).unwrap();
}

/// 多个测试都会调用, 只有第一次生效.
fn init_logger() {
    let _ = SimpleLogger::new().with_level(log::LevelFilter::Debug).init();
}

fn fast_options(out: &Path) -> SnapshotOptions {
    SnapshotOptions {
        savefig: Some(out.to_path_buf()),
        dpi: 30,
        width: 400,
        progress: false,
        ..Default::default()
    }
}

#[test]
fn sagittal_snapshot_end_to_end() {
    init_logger();
    let shape = (200, 200, 160);
    let dir = tempfile::tempdir().unwrap();
    let bg_path = dir.path().join("t1.nii");
    write(&bg_path, &head(shape));
    let segs: Vec<_> = [30.0, 20.0, 10.0]
        .iter()
        .enumerate()
        .map(|(c, &r)| {
            let p = dir.path().join(format!("c{}.nii", c + 1));
            write(&p, &ball(shape, (100.0, 100.0, 80.0), r));
            p
        })
        .collect();

    let out = dir.path().join("snap.jpg");
    let opts = SnapshotOptions {
        axes: vec![Axis::Sagittal],
        ..fast_options(&out)
    };
    let result = plot_segment_files(&segs, Some(&bg_path), &opts).unwrap();

    assert_eq!(result.overlay, out);
    assert_eq!(result.primary(), dir.path().join("snap_fusion.jpg"));
    assert_eq!(result.background.as_deref(), Some(dir.path().join("snap_orig.jpg").as_path()));
    for p in result.files() {
        assert_eq!(image::ImageFormat::from_path(p).unwrap(), image::ImageFormat::Jpeg);
        assert!(image::open(p).is_ok());
    }
    assert!(!dir.path().join("snap_S.jpg").exists());
    assert!(!dir.path().join("snap_orig_S.jpg").exists());

    // 默认切片 90..110, 每行 6 个
    let stack = SegStack::from_channels(&segs.iter().map(|p| Volume::open(p).unwrap()).collect::<Vec<_>>()).unwrap();
    let slices = SliceSelection::Auto.resolve(Axis::Sagittal, stack.shape()).unwrap();
    assert_eq!(slices.len(), 20);
    let layout = PanelLayout::for_axis(Axis::Sagittal, &RowSizes::Default, None, 30);
    let panels = render_overlay_panels(&stack, Axis::Sagittal, &slices, &layout, &ProgressBar::hidden()).unwrap();
    assert_eq!(panels.len(), 4);
}

#[test]
fn panel_count_per_axis() {
    let shape = (40, 36, 30);
    let stack = SegStack::from_channels(&[Volume::from_array(ball(shape, (20.0, 18.0, 15.0), 12.0))]).unwrap();
    let sel = SliceSelection::Same((0..25).collect());
    let rows = RowSizes::Default;
    for axis in Axis::ALL {
        let slices = sel.resolve(axis, shape).unwrap();
        let layout = PanelLayout::for_axis(axis, &rows, Some(4.0), 20);
        let panels = render_overlay_panels(&stack, axis, &slices, &layout, &ProgressBar::hidden()).unwrap();
        assert_eq!(panels.len(), slices.len().div_ceil(rows.get(axis)));
    }
}

#[test]
fn empty_slices_are_skipped_and_boxes_are_shared() {
    let shape = (30, 30, 30);
    // 只在 i 属于 10..20 时非零
    let seg = Array3::from_shape_fn(shape, |(i, j, k)| {
        if (10..20).contains(&i) && (5..25).contains(&j) && (8..12).contains(&k) {
            0.8f32
        } else {
            0.0
        }
    });
    let stack = SegStack::from_channels(&[Volume::from_array(seg)]).unwrap();
    let bg = Volume::from_array(head(shape));
    let slices: Vec<usize> = (0..30).collect();
    let layout = PanelLayout::for_axis(Axis::Sagittal, &RowSizes::Uniform(5), Some(3.0), 20);
    let pb = ProgressBar::hidden();

    let over = render_overlay_panels(&stack, Axis::Sagittal, &slices, &layout, &pb).unwrap();
    for (&index, bb) in slices.iter().zip(over.boxes()) {
        let slice = stack.slice_at(Axis::Sagittal, index);
        assert_eq!(bb.is_some(), (10..20).contains(&index));
        assert_eq!(*bb, slice.bounding_box());
        // 全零切片在三个通道上都没有内容
        if bb.is_none() {
            assert!(slice.is_empty());
        }
    }

    let back = render_background_panels(&bg, Axis::Sagittal, &slices, over.boxes(), &layout, &pb).unwrap();
    assert_eq!(back.boxes(), over.boxes());
    assert_eq!(back.len(), 6);
    for (a, b) in over.paths().iter().zip(back.paths()) {
        assert_eq!(image::image_dimensions(a).unwrap(), image::image_dimensions(b).unwrap());
    }
}

#[test]
fn missing_channels_are_zero_filled() {
    let shape = (12, 14, 16);
    let dir = tempfile::tempdir().unwrap();
    let c1 = dir.path().join("c1.nii.gz");
    let c2 = dir.path().join("c2.nii.gz");
    write(&c1, &ball(shape, (6.0, 7.0, 8.0), 4.0));
    write(&c2, &ball(shape, (6.0, 7.0, 8.0), 2.0));

    let volumes = [Volume::open(&c1).unwrap(), Volume::open(&c2).unwrap()];
    let stack = SegStack::from_channels(&volumes).unwrap();
    assert_eq!(stack.channel(2).dim(), shape);
    assert!(stack.channel(2).iter().all(|&v| v == 0.0));
    assert_eq!(stack.channel(1), volumes[1].data());
}

#[test]
fn stacked_4d_file_splits_into_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.nii");
    let data = Array4::from_shape_fn((6, 7, 8, 3), |(i, _, _, c)| (i * 10 + c) as f32);
    WriterOptions::new(&path).write_nifti(&data).unwrap();

    let channels = load_channels(&path).unwrap();
    assert_eq!(channels.len(), 3);
    assert_eq!(channels[2].shape(), (6, 7, 8));
    assert_eq!(channels[2].data()[(4, 0, 0)], 42.0);
    assert!(matches!(Volume::open(&path), Err(SnapError::Dimensionality(4))));
}

/// 缓存模式下不应访问归档.
struct OfflineArchive;

impl Archive for OfflineArchive {
    fn scans(&self, _: &str) -> SnapResult<Vec<ScanInfo>> {
        panic!("network access in cache mode")
    }

    fn scan_files(&self, _: &str, _: &str, _: &str, _: &str) -> SnapResult<Vec<RemoteFile>> {
        panic!("network access in cache mode")
    }

    fn resource_files(&self, _: &str, _: &str, _: &str) -> SnapResult<Vec<RemoteFile>> {
        panic!("network access in cache mode")
    }

    fn download(&self, _: &RemoteFile, _: &Path) -> SnapResult<()> {
        panic!("network access in cache mode")
    }
}

#[test]
fn cached_xnat_snapshot() {
    init_logger();
    let shape = (24, 24, 24);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().to_path_buf();
    write(&dest.join("E7_T1.nii.gz"), &head(shape));
    for (c, r) in [("c1", 8.0), ("c2", 6.0), ("c3", 4.0)] {
        write(&dest.join(format!("E7_SPM12_SEGMENT_{c}.nii.gz")), &ball(shape, (12.0, 12.0, 12.0), r));
    }

    let out = dir.path().join("E7.gif");
    let mut snapshot = fast_options(&out);
    snapshot.slices = SliceSelection::Same(vec![10, 12, 14]);
    snapshot.animated = true;
    snapshot.raw = false;
    let options = XnatSnapOptions {
        cache: true,
        dest: Some(dest.clone()),
        snapshot,
        ..Default::default()
    };
    let result = plot_segment(&OfflineArchive, "E7", &options).unwrap();
    assert_eq!(result.primary(), out);
    assert!(out.is_file());
    assert!(!dest.join("E7_fusion_000.jpg").exists());

    // 缺少文件时给出明确的提示
    std::fs::remove_file(dest.join("E7_SPM12_SEGMENT_c3.nii.gz")).unwrap();
    let err = plot_segment(&OfflineArchive, "E7", &options).unwrap_err();
    assert!(err.to_string().ends_with("Retry with cache set to False."));
}
