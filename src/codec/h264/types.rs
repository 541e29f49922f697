use bytes::Bytes;

/// One NAL unit taken out of a length-prefixed access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NALUnit {
    pub nal_type: u8,
    pub nal_ref_idc: u8,
    pub data: Bytes,
}

impl NALUnit {
    /// Wraps a NAL payload; the header byte must be present.
    pub fn new(data: Bytes) -> Option<Self> {
        let header = *data.first()?;
        Some(Self {
            nal_type: header & 0x1F,
            nal_ref_idc: (header >> 5) & 0x03,
            data,
        })
    }

    pub fn unit_type(&self) -> NALUnitType {
        NALUnitType::from(self.nal_type)
    }

    /// True for NAL units carrying picture data.
    pub fn is_slice(&self) -> bool {
        self.nal_type == 1 || self.nal_type == 5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NALUnitType {
    Unspecified = 0,
    CodedSliceNonIDR = 1,
    CodedSliceDataPartitionA = 2,
    CodedSliceDataPartitionB = 3,
    CodedSliceDataPartitionC = 4,
    CodedSliceIDR = 5,
    SEI = 6,
    SPS = 7,
    PPS = 8,
    AccessUnitDelimiter = 9,
    EndOfSequence = 10,
    EndOfStream = 11,
    FillerData = 12,
}

impl From<u8> for NALUnitType {
    fn from(value: u8) -> Self {
        match value & 0x1F {
            1 => NALUnitType::CodedSliceNonIDR,
            2 => NALUnitType::CodedSliceDataPartitionA,
            3 => NALUnitType::CodedSliceDataPartitionB,
            4 => NALUnitType::CodedSliceDataPartitionC,
            5 => NALUnitType::CodedSliceIDR,
            6 => NALUnitType::SEI,
            7 => NALUnitType::SPS,
            8 => NALUnitType::PPS,
            9 => NALUnitType::AccessUnitDelimiter,
            10 => NALUnitType::EndOfSequence,
            11 => NALUnitType::EndOfStream,
            12 => NALUnitType::FillerData,
            _ => NALUnitType::Unspecified,
        }
    }
}
