use crate::shared::letterbox::InputLayout;

/// Reads the image input layout and square size from a model's first input,
/// falling back to NCHW at `default_size` when the shape is dynamic.
pub(crate) fn input_spec(session: &ort::session::Session, default_size: u32) -> (InputLayout, u32) {
    let dims: Vec<i64> = session
        .inputs()
        .first()
        .and_then(|input| match input.dtype() {
            ort::value::ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
            _ => None,
        })
        .unwrap_or_default();
    layout_from_dims(&dims, default_size)
}

fn layout_from_dims(dims: &[i64], default_size: u32) -> (InputLayout, u32) {
    if dims.len() != 4 {
        return (InputLayout::Nchw, default_size);
    }
    let size = |d: i64| if d > 0 { d as u32 } else { default_size };
    if dims[3] == 3 && dims[1] != 3 {
        (InputLayout::Nhwc, size(dims[1]))
    } else {
        (InputLayout::Nchw, size(dims[2]))
    }
}
