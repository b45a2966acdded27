use anyhow::Result;
use grndwork_api_client::{Client, DataOptions, GetDataFilesQuery, GetDataQuery};

fn main() -> Result<()> {
    // Configure the refresh token via GROUNDWORK_TOKEN_PATH, or
    // GROUNDWORK_SUBJECT and GROUNDWORK_TOKEN.
    let client = Client::from_env()?;

    let query = GetDataQuery {
        files: GetDataFilesQuery {
            limit: Some(5),
            ..Default::default()
        },
        records_limit: Some(3),
        ..Default::default()
    };

    for file in client.get_data_with_records(&query, DataOptions::default())? {
        let file = file?;
        println!("{} ({})", file.file.filename, file.file.source);

        for record in file.records {
            let record = record?;
            let flagged = record.qc_flags.as_ref().map_or(0, |flags| flags.len());
            println!(
                "  {} #{} {} values, {} flagged",
                record.timestamp,
                record.record_num,
                record.data.len(),
                flagged
            );
        }
    }

    Ok(())
}
