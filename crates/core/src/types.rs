/// Opaque ticket identifier correlating the client and server views of one job.
pub type TicketId = String;

/// Input annotation formats the service knows how to read.
pub const INPUT_FORMAT_CVAT_IMAGES_1_1: &str = "cvat_images_1_1";

pub const TARGET_FORMAT_YOLO: &str = "yolo";
pub const TARGET_FORMAT_PASCAL_VOC: &str = "pascal_voc";
pub const TARGET_FORMAT_TAO_KITTI: &str = "tao_kitti";

/// Target formats offered by the service. The client passes tags through
/// unchanged; this list only feeds help text and completion.
pub const KNOWN_TARGET_FORMATS: &[&str] = &[
    TARGET_FORMAT_YOLO,
    TARGET_FORMAT_PASCAL_VOC,
    TARGET_FORMAT_TAO_KITTI,
];
