//! 通用常量.

/// 渲染相关的默认参数.
pub mod layout {
    /// 轴状面默认每行切片数.
    pub const ROW_SIZE_AXIAL: usize = 9;

    /// 冠状面默认每行切片数.
    pub const ROW_SIZE_CORONAL: usize = 9;

    /// 矢状面默认每行切片数.
    pub const ROW_SIZE_SAGITTAL: usize = 6;

    /// 轴状面默认画布宽度, 以英寸为单位.
    pub const FIG_WIDTH_AXIAL: f32 = 37.0;

    /// 冠状面默认画布宽度, 以英寸为单位.
    pub const FIG_WIDTH_CORONAL: f32 = 40.0;

    /// 矢状面默认画布宽度, 以英寸为单位.
    pub const FIG_WIDTH_SAGITTAL: f32 = 18.0;

    /// 默认画布高度, 以英寸为单位. 所有方向相同.
    pub const FIG_HEIGHT: f32 = 3.0;

    /// 默认渲染分辨率.
    pub const DPI: u32 = 300;

    /// 切片编号标签的字号 (磅).
    pub const LABEL_FONT_PT: f32 = 10.0;

    /// 最终合成图的统一宽度, 以像素为单位.
    pub const MONTAGE_WIDTH: u32 = 2000;
}

/// 合成相关的默认参数.
pub mod blend {
    /// 默认不透明度 (%).
    pub const OPACITY: u8 = 10;

    /// 动画中相邻两帧的不透明度差 (%).
    pub const OPACITY_STEP: u8 = 10;
}

/// XNAT 归档的命名约定.
pub mod xnat {
    /// 默认 T1 序列名.
    pub const T1_SEQUENCE: &str = "T1_ALFA1";

    /// 默认 T2 序列名.
    pub const T2_SEQUENCE: &str = "T2_ALFA1";

    /// 扫描 NIfTI 文件所在的资源.
    pub const NIFTI_RESOURCE: &str = "NIFTI";

    /// 配准到 T1 空间的 T2 所在的资源.
    pub const ANTS_RESOURCE: &str = "ANTS";

    /// 默认分割资源.
    pub const DEFAULT_RESOURCE: &str = "SPM12_SEGMENT";

    /// 视为有效扫描的数据类型.
    pub const SCAN_DATATYPES: [&str; 3] = ["xnat:mrScanData", "xnat:petScanData", "xnat:ctScanData"];

    /// 有效扫描的质量标记.
    pub const USABLE: &str = "usable";
}

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;
}
