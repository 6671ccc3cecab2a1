use tripo3d_client::{ClientConfig, TripoClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = TripoClient::open(&ClientConfig::from_dotenv())?;

    println!("Querying account balance...");

    match client.get_balance().await {
        Ok(balance) => {
            println!("Balance: {}, frozen: {}", balance.balance, balance.frozen);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
        }
    }

    client.close();
    Ok(())
}
