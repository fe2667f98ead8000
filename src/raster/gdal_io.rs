use crate::error::{RasterError, Result};
use crate::raster::{
    check_row_len, GeoReference, OutputOptions, RasterMetadata, RasterReader, RasterWriter,
};
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, RasterBand};
use gdal::{Dataset, DriverManager};
use log::{debug, info, warn};
use std::path::Path;

/// Reads band 1 of any GDAL-supported raster
pub struct GdalRasterReader {
    dataset: Dataset,
    metadata: RasterMetadata,
}

impl GdalRasterReader {
    pub fn open(path: &Path, nodata_override: Option<f64>) -> Result<Self> {
        info!("Opening input raster: {}", path.display());
        let dataset = Dataset::open(path)?;

        if dataset.raster_count() > 1 {
            warn!(
                "Input has {} bands, only band 1 is processed",
                dataset.raster_count()
            );
        }

        let rasterband: RasterBand = dataset.rasterband(1)?;
        let width = rasterband.x_size() as usize;
        let height = rasterband.y_size() as usize;

        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions(width, height));
        }

        let nodata = nodata_override.or_else(|| rasterband.no_data_value());

        let geo = match dataset.geo_transform() {
            Ok(geo_transform) => {
                let projection = dataset.projection();
                let mut geo = GeoReference::from_geo_transform(geo_transform);
                geo.projection = (!projection.is_empty()).then_some(projection);
                Some(geo)
            }
            Err(e) => {
                debug!("No geotransform on input: {}", e);
                None
            }
        };

        debug!("Raster dimensions: {}x{}", width, height);

        Ok(Self {
            dataset,
            metadata: RasterMetadata {
                width,
                height,
                geo,
                nodata,
            },
        })
    }
}

impl RasterReader for GdalRasterReader {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn read_row(&mut self, row: usize, buf: &mut [f64]) -> Result<()> {
        if row >= self.metadata.height {
            return Err(RasterError::RowOutOfRange {
                row,
                rows: self.metadata.height,
            });
        }
        let width = self.metadata.width;
        check_row_len(width, buf.len())?;

        let rasterband = self.dataset.rasterband(1)?;
        let buffer = rasterband.read_as::<f64>((0, row as isize), (width, 1), (width, 1), None)?;

        let nodata = self.metadata.nodata;
        for (dst, &src) in buf.iter_mut().zip(buffer.data()) {
            *dst = match nodata {
                Some(nd) if src == nd => f64::NAN,
                _ => src,
            };
        }
        Ok(())
    }
}

pub struct GdalRasterWriter {
    dataset: Dataset,
    metadata: RasterMetadata,
    next_row: usize,
}

impl RasterWriter for GdalRasterWriter {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn write_row(&mut self, row: &[f64]) -> Result<()> {
        let (width, height) = (self.metadata.width, self.metadata.height);
        if self.next_row == height {
            return Err(RasterError::OutputComplete(height));
        }
        check_row_len(width, row.len())?;

        let mut raster_band = self.dataset.rasterband(1)?;
        let mut buffer = Buffer::new((width, 1), row.to_vec());
        raster_band.write((0, self.next_row as isize), (width, 1), &mut buffer)?;

        self.next_row += 1;
        Ok(())
    }

    fn rows_written(&self) -> usize {
        self.next_row
    }
}

/// Create a single-band float64 GeoTIFF through GDAL and fill it through `f`
pub fn write_raster<T, F>(
    path: &Path,
    metadata: &RasterMetadata,
    options: &OutputOptions,
    f: F,
) -> Result<T>
where
    F: FnOnce(&mut dyn RasterWriter) -> Result<T>,
{
    let (width, height) = (metadata.width, metadata.height);
    if width == 0 || height == 0 {
        return Err(RasterError::InvalidDimensions(width, height));
    }

    info!("Creating output raster: {}", path.display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut gdal_options = CslStringList::new();
    gdal_options.add_string(&format!("COMPRESS={}", options.compression.gdal_name()))?;

    let mut dataset = driver.create_with_band_type_with_options::<f64, _>(
        path,
        width,
        height,
        1,
        &gdal_options,
    )?;

    if let Some(geo) = &metadata.geo {
        dataset.set_geo_transform(&geo.geo_transform)?;
        if let Some(projection) = &geo.projection {
            dataset.set_projection(projection)?;
        }
    }
    dataset.rasterband(1)?.set_no_data_value(Some(f64::NAN))?;

    let mut writer = GdalRasterWriter {
        dataset,
        metadata: metadata.clone(),
        next_row: 0,
    };

    let value = f(&mut writer)?;

    if writer.next_row != height {
        return Err(RasterError::OutputIncomplete {
            written: writer.next_row,
            expected: height,
        });
    }

    // Closing the dataset flushes it to disk
    drop(writer);
    Ok(value)
}
