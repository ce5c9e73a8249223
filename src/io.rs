//! Tensor dump file writer (spec.md §6 persisted layout).
//!
//! A small bespoke container: a text header (title, per-component
//! labels, geometry block, units, body format), followed by a body of
//! either raw IEEE 754 bytes or `write!`-formatted text. Before writing,
//! the `-1` sign absorbed by the builder's FFT-scale step is removed so
//! the stored values are the geometric tensor `N`, not `-N`.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
};

use crate::{config::TensorDumpFormat, mesh::MeshSpec, tensor::DemagTensor, Error};

/// Writes a built [`DemagTensor`] to `path` in the requested format.
pub struct TensorDumpWriter;

impl TensorDumpWriter {
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created or written.
    pub fn write(
        path: &str,
        mesh: &MeshSpec,
        tensor: &DemagTensor,
        fmt: TensorDumpFormat,
    ) -> Result<(), Error> {
        let to_io_err = |source: io::Error| Error::Io {
            path: path.to_string(),
            source,
        };

        let file = File::create(path).map_err(to_io_err)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, mesh, tensor, fmt).map_err(to_io_err)?;
        write_body(&mut writer, tensor, fmt).map_err(to_io_err)?;
        writer.flush().map_err(to_io_err)
    }
}

fn write_header(
    writer: &mut impl Write,
    mesh: &MeshSpec,
    tensor: &DemagTensor,
    fmt: TensorDumpFormat,
) -> io::Result<()> {
    writeln!(writer, "# OOMMF demagnetization tensor dump")?;
    writeln!(writer, "# title: A-hat (geometric tensor N, sign restored)")?;
    writeln!(writer, "# components: Nxx Nxy Nxz Nyy Nyz Nzz")?;
    writeln!(
        writer,
        "# mesh dims: {:?} cell_size: {:?} periodic: {:?}",
        mesh.dims(),
        mesh.cell_size(),
        mesh.periodic()
    )?;
    writeln!(writer, "# octant dims: {:?}", tensor.dims())?;
    writeln!(writer, "# units: dimensionless")?;
    writeln!(writer, "# format: {fmt:?}")?;
    writeln!(writer, "# end-header")?;
    Ok(())
}

fn write_body(writer: &mut impl Write, tensor: &DemagTensor, fmt: TensorDumpFormat) -> io::Result<()> {
    let octant = tensor.dims();
    for k in 0..octant[2] {
        for j in 0..octant[1] {
            for i in 0..octant[0] {
                let record = tensor.get(i, j, k);
                // Undo the `-1` the builder absorbed into the FFT scale.
                let values = [
                    -record.a00,
                    -record.a01,
                    -record.a02,
                    -record.a11,
                    -record.a12,
                    -record.a22,
                ];
                match fmt {
                    TensorDumpFormat::Binary4 => {
                        for v in values {
                            writer.write_all(&(v as f32).to_le_bytes())?;
                        }
                    }
                    TensorDumpFormat::Binary8 => {
                        for v in values {
                            writer.write_all(&v.to_le_bytes())?;
                        }
                    }
                    TensorDumpFormat::Text => {
                        writeln!(
                            writer,
                            "{:.17e} {:.17e} {:.17e} {:.17e} {:.17e} {:.17e}",
                            values[0], values[1], values[2], values[3], values[4], values[5],
                        )?;
                    }
                }
            }
        }
    }
    Ok(())
}

// ======================================================================
// TESTS
