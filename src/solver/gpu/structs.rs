use bytemuck::{Pod, Zeroable};

// Host mirrors of the uniform structs declared in the shared WGSL fragment.
// Field order and padding must match the shader declarations.

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct StepParams {
    pub dt: f32,
    pub cfl: f32,
    pub pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct BcParams {
    pub nchan: u32,
    pub chan: u32,
    pub side: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ReduceParams {
    pub n: u32,
    pub pad: [u32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CombineParams {
    pub scale: f32,
    pub pad: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct FillParams {
    pub value: u32,
    pub pad: [u32; 3],
}
