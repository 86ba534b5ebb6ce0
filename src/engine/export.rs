use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::models::driver::Driver;

const BOM: &[u8] = b"\xEF\xBB\xBF";

pub trait CsvRow {
    fn headers() -> &'static [&'static str];

    fn fields(&self) -> Vec<String>;
}

/// Free text goes into the file without commas or line breaks so every record stays on one line.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| *c != ',')
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn to_csv<R: CsvRow>(rows: &[R]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(BOM.to_vec());

    writer
        .write_record(R::headers())
        .map_err(|err| AppError::Internal(format!("failed to write csv header: {err}")))?;

    for row in rows {
        writer
            .write_record(row.fields())
            .map_err(|err| AppError::Internal(format!("failed to write csv row: {err}")))?;
    }

    writer
        .into_inner()
        .map_err(|err| AppError::Internal(format!("failed to flush csv: {err}")))
}

impl CsvRow for Delivery {
    fn headers() -> &'static [&'static str] {
        &[
            "tracking_code",
            "status",
            "customer_name",
            "customer_phone",
            "pickup_address",
            "dropoff_address",
            "price",
            "notes",
            "created_at",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.tracking_code.clone(),
            self.status.as_str().to_string(),
            sanitize(&self.customer_name),
            sanitize(&self.customer_phone),
            sanitize(&self.pickup_address),
            sanitize(&self.dropoff_address),
            format!("{:.2}", self.price),
            self.notes.as_deref().map(sanitize).unwrap_or_default(),
            self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]
    }
}

impl CsvRow for Driver {
    fn headers() -> &'static [&'static str] {
        &["name", "phone", "vehicle", "status", "rating", "updated_at"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            sanitize(&self.name),
            sanitize(&self.phone),
            sanitize(&self.vehicle),
            self.status.as_str().to_string(),
            format!("{:.1}", self.rating),
            self.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]
    }
}
